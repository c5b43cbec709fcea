//! Hierarchical spline spaces: per-level active and deactivated basis
//! functions on top of an [`HMesh`].
//!
//! # Expected invariants
//! - On every level, active and deactivated functions are disjoint.
//! - A function is deactivated exactly when every cell of its support on its
//!   own level is deactivated.
//! - `numdofs() == numactive().iter().sum()`.
//! - With a finite disparity `d`, refinement is graded: cells in the support
//!   extension of an active cell on level `m` are never active on a level
//!   below `m - d`.
//!
//! Every mutation goes through [`HSpace::refine`] (or [`HSpace::refine_region`])
//! and bumps [`HSpace::generation`]; cached classifications are tagged with it.

mod classify;
mod options;
mod represent;

pub use classify::{Classification, IndexStrategy};
pub use options::{BoundarySpec, HSpaceOptions, Side};

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::bspline::KnotVector;
use crate::cache::{GenerationCache, InvalidateCache};
use crate::debug_invariants::DebugInvariants;
use crate::hspline_error::HSplineError;
use crate::mesh::hierarchical::HMesh;
use crate::mesh::multi_index::{IndexSet, LevelSets, MultiIndex, ravel_all};
use crate::mesh::tensor::TensorMesh;

/// A hierarchical (HB/THB) spline space.
#[derive(Clone, Debug)]
pub struct HSpace<const D: usize> {
    hmesh: HMesh<D>,
    actfun: Vec<IndexSet<D>>,
    deactfun: Vec<IndexSet<D>>,
    options: HSpaceOptions,
    generation: u64,
    dirichlet: GenerationCache<Classification<D>>,
    global: GenerationCache<Classification<D>>,
}

impl<const D: usize> HSpace<D> {
    /// Single-level space over the tensor product of `kvs`, ungraded and
    /// without boundary facets.
    pub fn new(kvs: [KnotVector; D]) -> Result<Self, HSplineError> {
        Self::with_options(kvs, HSpaceOptions::default())
    }

    /// Single-level space over the tensor product of `kvs`.
    pub fn with_options(kvs: [KnotVector; D], options: HSpaceOptions) -> Result<Self, HSplineError> {
        options.validate(D)?;
        let mesh = TensorMesh::new(kvs)?;
        let actfun = vec![mesh.functions().collect()];
        Ok(Self {
            hmesh: HMesh::new(mesh),
            actfun,
            deactfun: vec![IndexSet::new()],
            options,
            generation: 0,
            dirichlet: GenerationCache::new(),
            global: GenerationCache::new(),
        })
    }

    pub fn options(&self) -> &HSpaceOptions {
        &self.options
    }

    pub fn numlevels(&self) -> usize {
        self.hmesh.numlevels()
    }

    /// Number of active functions per level.
    pub fn numactive(&self) -> Vec<usize> {
        self.actfun.iter().map(|af| af.len()).collect()
    }

    /// Total number of active functions.
    pub fn numdofs(&self) -> usize {
        self.actfun.iter().map(|af| af.len()).sum()
    }

    /// Counter bumped by every refinement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hmesh(&self) -> &HMesh<D> {
        &self.hmesh
    }

    pub fn mesh(&self, lv: usize) -> Result<&TensorMesh<D>, HSplineError> {
        self.hmesh.mesh(lv)
    }

    pub fn knotvectors(&self, lv: usize) -> Result<&[KnotVector; D], HSplineError> {
        Ok(self.hmesh.mesh(lv)?.knotvectors())
    }

    pub fn active_cells(&self, lv: usize) -> Result<&IndexSet<D>, HSplineError> {
        self.hmesh.active(lv)
    }

    pub fn deactivated_cells(&self, lv: usize) -> Result<&IndexSet<D>, HSplineError> {
        self.hmesh.deactivated(lv)
    }

    pub fn active_functions(&self, lv: usize) -> Result<&IndexSet<D>, HSplineError> {
        self.hmesh.mesh(lv)?;
        Ok(&self.actfun[lv])
    }

    pub fn deactivated_functions(&self, lv: usize) -> Result<&IndexSet<D>, HSplineError> {
        self.hmesh.mesh(lv)?;
        Ok(&self.deactfun[lv])
    }

    /// Extents of cell `c` on level `lv`, one `(min, max)` pair per axis.
    pub fn cell_extents(&self, lv: usize, c: &MultiIndex<D>) -> Result<[(f64, f64); D], HSplineError> {
        self.hmesh.mesh(lv)?.cell_extents(c)
    }

    /// Extents of the support of function `f` on level `lv`.
    pub fn function_support(&self, lv: usize, f: &MultiIndex<D>) -> Result<[(f64, f64); D], HSplineError> {
        self.hmesh.mesh(lv)?.function_support(f)
    }

    fn ravel_levels(&self, sets: &[IndexSet<D>]) -> Vec<Vec<usize>> {
        sets.iter()
            .zip(self.hmesh.meshes())
            .map(|(set, mesh)| ravel_all(set, &mesh.numdofs()))
            .collect()
    }

    /// Raveled (row-major) indices of the active functions, per level, sorted.
    pub fn active_indices(&self) -> Vec<Vec<usize>> {
        self.ravel_levels(&self.actfun)
    }

    /// Raveled (row-major) indices of the deactivated functions, per level, sorted.
    pub fn deactivated_indices(&self) -> Vec<Vec<usize>> {
        self.ravel_levels(&self.deactfun)
    }

    fn ensure_levels(&mut self, levels: usize) -> Result<(), HSplineError> {
        self.hmesh.ensure_levels(levels)?;
        while self.actfun.len() < self.hmesh.numlevels() {
            self.actfun.push(IndexSet::new());
            self.deactfun.push(IndexSet::new());
        }
        Ok(())
    }

    /// Cells of level `k <= l` in the support of functions of level `k` that
    /// are supported on (the ancestors of) `cells` of level `l`.
    pub fn cell_support_extension<'a>(
        &self,
        l: usize,
        cells: impl IntoIterator<Item = &'a MultiIndex<D>>,
        k: usize,
    ) -> Result<IndexSet<D>, HSplineError> {
        if k > l {
            return Err(HSplineError::InvalidTargetLevel { level: l, target: k });
        }
        let ancestors = if k == l {
            cells.into_iter().copied().collect()
        } else {
            self.hmesh.cell_grandparent(l, cells, k)?
        };
        let mesh = self.hmesh.mesh(k)?;
        let funcs = mesh.supported_in(&ancestors)?;
        mesh.support(&funcs)
    }

    /// Functions of level `k <= l` supported on the ancestors of the support
    /// of `functions` of level `l`.
    pub fn function_support_extension<'a>(
        &self,
        l: usize,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
        k: usize,
    ) -> Result<IndexSet<D>, HSplineError> {
        if k > l {
            return Err(HSplineError::InvalidTargetLevel { level: l, target: k });
        }
        let mut cells = self.hmesh.mesh(l)?.support(functions)?;
        if k < l {
            cells = self.hmesh.cell_grandparent(l, &cells, k)?;
        }
        self.hmesh.mesh(k)?.supported_in(&cells)
    }

    /// Active cells on level `l - d` that interact with `cells` of level `l`.
    fn cell_neighborhood(
        &self,
        l: usize,
        cells: &IndexSet<D>,
        d: usize,
        truncate: bool,
    ) -> Result<IndexSet<D>, HSplineError> {
        let coarse = l - d;
        let region = if truncate {
            let ext = self.cell_support_extension(l, cells, coarse + 1)?;
            self.hmesh.cell_parent(coarse + 1, &ext)?
        } else {
            self.cell_support_extension(l, cells, coarse)?
        };
        let active = self.hmesh.active(coarse)?;
        Ok(region.intersection(active).copied().collect())
    }

    /// Add to `marked` every coarse cell required to keep the mesh graded.
    ///
    /// Marks only move to strictly coarser levels, so the loop per level runs
    /// at most `l / d` times.
    fn grade(&self, marked: &mut LevelSets<D>, d: usize, truncate: bool) -> Result<(), HSplineError> {
        for l in 0..self.numlevels() {
            let mut cur = l;
            while cur >= d {
                let Some(cells) = marked.get(&cur) else { break };
                let extra = self.cell_neighborhood(cur, cells, d, truncate)?;
                if extra.is_empty() {
                    break;
                }
                log::trace!("grading: level {cur} marks {} cells on level {}", extra.len(), cur - d);
                marked.entry(cur - d).or_default().extend(extra);
                cur -= d;
            }
        }
        Ok(())
    }

    /// Refine the marked cells (a map from level to active cells on it).
    ///
    /// With a finite disparity, further cells on coarser levels are marked
    /// first so that the mesh stays graded; `truncate` selects the grading
    /// neighborhood suited to the truncated basis. Nothing is mutated if a
    /// level or cell is invalid.
    pub fn refine(&mut self, marked: &LevelSets<D>, truncate: bool) -> Result<(), HSplineError> {
        self.hmesh.validate_marked(marked)?;
        let Some(&finest_marked) = marked.keys().next_back() else {
            return Ok(());
        };
        if marked.values().all(|cells| cells.is_empty()) {
            log::warn!("refinement request on {} levels marks no cells", marked.len());
            return Ok(());
        }
        self.ensure_levels(finest_marked + 2)?;
        let mut marked = marked.clone();
        if let Some(d) = self.options.disparity {
            self.grade(&mut marked, d, truncate)?;
        }
        self.apply_refinement(&marked)
    }

    /// Refine every active cell of level `lv` whose center satisfies `predicate`.
    ///
    /// The center is passed in reversed axis order, i.e. `[x, y, ...]` where
    /// the last axis is `x`.
    pub fn refine_region(&mut self, lv: usize, mut predicate: impl FnMut(&[f64; D]) -> bool) -> Result<(), HSplineError> {
        let mesh = self.hmesh.mesh(lv)?;
        let mut cells = IndexSet::new();
        for c in self.hmesh.active(lv)? {
            let mut center = mesh.cell_extents(c)?.map(|(lo, hi)| 0.5 * (lo + hi));
            center.reverse();
            if predicate(&center) {
                cells.insert(*c);
            }
        }
        self.refine(&LevelSets::from([(lv, cells)]), false)
    }

    /// Refine cells and update the function sets, without grading.
    fn apply_refinement(&mut self, marked: &LevelSets<D>) -> Result<(), HSplineError> {
        if let Some(&finest_marked) = marked.keys().next_back() {
            self.ensure_levels(finest_marked + 2)?;
        }
        let new_cells = self.hmesh.refine(marked)?;
        let to_deactivate = self.functions_to_deactivate(marked)?;

        let levels = self.hmesh.numlevels();
        for lv in 0..levels - 1 {
            if let Some(funcs) = to_deactivate.get(&lv) {
                for f in funcs {
                    self.actfun[lv].remove(f);
                    self.deactfun[lv].insert(*f);
                }
            }
            let Some(cells) = new_cells.get(&(lv + 1)).filter(|c| !c.is_empty()) else {
                continue;
            };
            let fine = self.hmesh.mesh(lv + 1)?;
            let represented: IndexSet<D> = self
                .hmesh
                .active(lv + 1)?
                .union(self.hmesh.deactivated(lv + 1)?)
                .copied()
                .collect();
            let mut activated = Vec::new();
            for f in fine.supported_in(cells)? {
                if self.actfun[lv + 1].contains(&f) || self.deactfun[lv + 1].contains(&f) {
                    continue;
                }
                if fine.support([&f])?.is_subset(&represented) {
                    activated.push(f);
                }
            }
            self.actfun[lv + 1].extend(activated);
        }

        self.generation += 1;
        self.invalidate_cache();
        log::debug!(
            "hierarchical space: generation {}, {} levels, {} dofs",
            self.generation,
            levels,
            self.numdofs()
        );
        crate::debug_invariants!(self.validate_invariants(), "HSpace::refine");
        Ok(())
    }

    /// Active functions on the marked levels whose support has no active cell left.
    fn functions_to_deactivate(&self, marked: &LevelSets<D>) -> Result<LevelSets<D>, HSplineError> {
        let mut out = LevelSets::new();
        for (&lv, cells) in marked {
            let mesh = self.hmesh.mesh(lv)?;
            let active = self.hmesh.active(lv)?;
            let mut dead = IndexSet::new();
            for f in mesh.supported_in(cells)? {
                if !self.actfun[lv].contains(&f) {
                    continue;
                }
                if mesh.support([&f])?.is_disjoint(active) {
                    dead.insert(f);
                }
            }
            out.insert(lv, dead);
        }
        Ok(out)
    }

    /// The space as it was after replaying only the deactivations of levels
    /// `< level`; it has `level + 1` levels and the same options.
    pub fn virtual_space(&self, level: usize) -> Result<Self, HSplineError> {
        self.hmesh.mesh(level)?;
        let kvs = self.hmesh.mesh(0)?.knotvectors().clone();
        let mut out = Self::with_options(kvs, self.options.clone())?;
        for i in 0..level {
            let step = LevelSets::from([(i, self.hmesh.deactivated(i)?.clone())]);
            out.apply_refinement(&step)?;
        }
        Ok(out)
    }

    /// Sparse 0/1 matrix with a row per active function and a column per
    /// active cell (both ordered by level, then lexicographically); an entry
    /// is one if the cell lies in the support of the function.
    pub fn incidence_matrix(&self) -> Result<CsrMatrix<f64>, HSplineError> {
        let levels = self.numlevels();
        let cells: Vec<Vec<MultiIndex<D>>> = (0..levels)
            .map(|lv| self.hmesh.active(lv).map(|a| a.iter().copied().collect()))
            .collect::<Result<_, _>>()?;
        let ncells: usize = cells.iter().map(Vec::len).sum();
        let mut coo = CooMatrix::new(self.numdofs(), ncells);
        let mut row = 0;
        for (lf, funcs) in self.actfun.iter().enumerate() {
            let mesh = self.hmesh.mesh(lf)?;
            for f in funcs {
                let supp = mesh.support([f])?;
                let mut col = 0;
                for (lc, level_cells) in cells.iter().enumerate() {
                    let coarse_supp = if lc < lf {
                        Some(self.hmesh.cell_grandparent(lf, &supp, lc)?)
                    } else {
                        None
                    };
                    for c in level_cells {
                        let inside = match &coarse_supp {
                            Some(s) => s.contains(c),
                            None => supp.contains(&c.map(|ci| ci >> (lc - lf))),
                        };
                        if inside {
                            coo.push(row, col, 1.0);
                        }
                        col += 1;
                    }
                }
                row += 1;
            }
        }
        Ok(CsrMatrix::from(&coo))
    }

    /// Split a coefficient vector of length [`numdofs`](Self::numdofs) into
    /// one slice per level.
    pub fn split_coeffs<'a>(&self, x: &'a [f64]) -> Result<Vec<&'a [f64]>, HSplineError> {
        if x.len() != self.numdofs() {
            return Err(HSplineError::LengthMismatch {
                expected: self.numdofs(),
                found: x.len(),
            });
        }
        let mut rest = x;
        let mut out = Vec::with_capacity(self.numlevels());
        for n in self.numactive() {
            let (head, tail) = rest.split_at(n);
            out.push(head);
            rest = tail;
        }
        Ok(out)
    }
}

impl<const D: usize> InvalidateCache for HSpace<D> {
    fn invalidate_cache(&mut self) {
        self.dirichlet.invalidate_cache();
        self.global.invalidate_cache();
    }
}

impl<const D: usize> DebugInvariants for HSpace<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "HSpace");
    }

    fn validate_invariants(&self) -> Result<(), HSplineError> {
        self.hmesh.validate_invariants()?;
        let n = self.hmesh.numlevels();
        if self.actfun.len() != n || self.deactfun.len() != n {
            return Err(HSplineError::BrokenInvariant(
                "function sets do not match the number of levels".into(),
            ));
        }
        for lv in 0..n {
            if let Some(f) = self.actfun[lv].intersection(&self.deactfun[lv]).next() {
                return Err(HSplineError::BrokenInvariant(format!(
                    "function {f:?} on level {lv} is both active and deactivated"
                )));
            }
            let mesh = self.hmesh.mesh(lv)?;
            for f in self.actfun[lv].iter().chain(&self.deactfun[lv]) {
                mesh.check_function(f)?;
            }
        }
        Ok(())
    }
}
