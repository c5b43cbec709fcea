//! Hierarchical meshes: a stack of uniformly refined tensor product meshes
//! with per-level active and deactivated cells.
//!
//! # Expected invariants
//! - Level `l + 1` is the uniform bisection of level `l`; the per-axis
//!   prolongation between them is computed once and never mutated.
//! - On every level, active and deactivated cells are disjoint.
//! - Every deactivated cell has all of its `2^D` children represented
//!   (active or deactivated) on the next level.
//! - The active cells of all levels tile the domain exactly once.
//!
//! Queries never mutate; only [`HMesh::ensure_levels`] and [`HMesh::refine`] do.

use nalgebra_sparse::{CscMatrix, CsrMatrix};

use crate::bspline::prolongation;
use crate::debug_invariants::DebugInvariants;
use crate::hspline_error::HSplineError;
use crate::mesh::multi_index::{IndexSet, LevelSets, MultiIndex, product, product_of_lists};
use crate::mesh::tensor::TensorMesh;

/// One-dimensional prolongation between two consecutive levels, with row and
/// column access to its sparsity pattern.
#[derive(Clone, Debug)]
pub struct Prolongation1d {
    csr: CsrMatrix<f64>,
    csc: CscMatrix<f64>,
}

impl Prolongation1d {
    fn new(csr: CsrMatrix<f64>) -> Self {
        let csc = CscMatrix::from(&csr);
        Self { csr, csc }
    }

    /// The `fine × coarse` prolongation matrix.
    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.csr
    }

    /// Fine functions with a nonzero coefficient for coarse function `j`.
    fn children(&self, axis: usize, j: usize) -> Result<Vec<usize>, HSplineError> {
        self.csc
            .get_col(j)
            .map(|col| col.row_indices().to_vec())
            .ok_or(HSplineError::IndexOutOfRange {
                axis,
                index: j,
                extent: self.csc.ncols(),
            })
    }

    /// Coarse functions contributing to fine function `i`.
    fn parents(&self, axis: usize, i: usize) -> Result<Vec<usize>, HSplineError> {
        self.csr
            .get_row(i)
            .map(|row| row.col_indices().to_vec())
            .ok_or(HSplineError::IndexOutOfRange {
                axis,
                index: i,
                extent: self.csr.nrows(),
            })
    }
}

/// A hierarchical mesh built on a sequence of uniformly refined tensor product meshes.
#[derive(Clone, Debug)]
pub struct HMesh<const D: usize> {
    meshes: Vec<TensorMesh<D>>,
    active: Vec<IndexSet<D>>,
    deactivated: Vec<IndexSet<D>>,
    prolongations: Vec<[Prolongation1d; D]>,
}

impl<const D: usize> HMesh<D> {
    /// Single-level hierarchy with every cell of `mesh` active.
    pub fn new(mesh: TensorMesh<D>) -> Self {
        let active = mesh.cells().collect();
        Self {
            meshes: vec![mesh],
            active: vec![active],
            deactivated: vec![IndexSet::new()],
            prolongations: Vec::new(),
        }
    }

    /// Number of allocated levels.
    pub fn numlevels(&self) -> usize {
        self.meshes.len()
    }

    /// Tensor product mesh of level `lv`.
    pub fn mesh(&self, lv: usize) -> Result<&TensorMesh<D>, HSplineError> {
        self.check_level(lv, 0, self.numlevels())?;
        Ok(&self.meshes[lv])
    }

    /// Tensor product meshes of all levels, coarsest first.
    pub fn meshes(&self) -> &[TensorMesh<D>] {
        &self.meshes
    }

    /// Finest allocated tensor product mesh.
    pub fn finest(&self) -> &TensorMesh<D> {
        &self.meshes[self.meshes.len() - 1]
    }

    /// Active cells on level `lv`.
    pub fn active(&self, lv: usize) -> Result<&IndexSet<D>, HSplineError> {
        self.check_level(lv, 0, self.numlevels())?;
        Ok(&self.active[lv])
    }

    /// Deactivated cells on level `lv`.
    pub fn deactivated(&self, lv: usize) -> Result<&IndexSet<D>, HSplineError> {
        self.check_level(lv, 0, self.numlevels())?;
        Ok(&self.deactivated[lv])
    }

    /// Per-axis prolongation from level `lv` to `lv + 1`.
    pub fn prolongation(&self, lv: usize) -> Result<&[Prolongation1d; D], HSplineError> {
        self.check_level(lv, 0, self.prolongations.len())?;
        Ok(&self.prolongations[lv])
    }

    fn check_level(&self, level: usize, min: usize, end: usize) -> Result<(), HSplineError> {
        if level < min || level >= end {
            return Err(HSplineError::InvalidLevel { level, min, end });
        }
        Ok(())
    }

    fn add_level(&mut self) -> Result<(), HSplineError> {
        let coarse = self.finest();
        let fine = coarse.refine()?;
        let factors = coarse
            .knotvectors()
            .iter()
            .zip(fine.knotvectors())
            .map(|(k0, k1)| prolongation(k0, k1).map(Prolongation1d::new))
            .collect::<Result<Vec<_>, _>>()?;
        let factors: [Prolongation1d; D] = factors.try_into().map_err(|_| {
            HSplineError::InconsistentDimensions("one prolongation per axis expected".into())
        })?;
        log::debug!(
            "hierarchical mesh: added level {} with {} cells",
            self.meshes.len(),
            fine.numel()
        );
        self.meshes.push(fine);
        self.active.push(IndexSet::new());
        self.deactivated.push(IndexSet::new());
        self.prolongations.push(factors);
        Ok(())
    }

    /// Make sure that the hierarchy has at least `levels` levels.
    pub fn ensure_levels(&mut self, levels: usize) -> Result<(), HSplineError> {
        while self.numlevels() < levels {
            self.add_level()?;
        }
        Ok(())
    }

    /// The `2^D` children on level `lv + 1` of every cell in `cells`.
    pub fn cell_children<'a>(
        &self,
        lv: usize,
        cells: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        self.check_level(lv, 0, self.numlevels().saturating_sub(1))?;
        let mut children = IndexSet::new();
        for c in cells {
            children.extend(product(std::array::from_fn(|d| 2 * c[d]..2 * c[d] + 2)));
        }
        Ok(children)
    }

    /// Descendants on `target` of cells on level `lv`, with `lv < target < numlevels`.
    pub fn cell_grandchildren<'a>(
        &self,
        lv: usize,
        cells: impl IntoIterator<Item = &'a MultiIndex<D>>,
        target: usize,
    ) -> Result<IndexSet<D>, HSplineError> {
        self.check_level(lv, 0, self.numlevels().saturating_sub(1))?;
        if !(lv < target && target < self.numlevels()) {
            return Err(HSplineError::InvalidTargetLevel { level: lv, target });
        }
        let mut current = self.cell_children(lv, cells)?;
        for l in lv + 1..target {
            current = self.cell_children(l, &current)?;
        }
        Ok(current)
    }

    /// Parents on level `lv - 1` of cells on level `lv`.
    pub fn cell_parent<'a>(
        &self,
        lv: usize,
        cells: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        self.check_level(lv, 1, self.numlevels())?;
        Ok(cells.into_iter().map(|c| c.map(|ci| ci / 2)).collect())
    }

    /// Ancestors on `target` of cells on level `lv`, with `target < lv`.
    pub fn cell_grandparent<'a>(
        &self,
        lv: usize,
        cells: impl IntoIterator<Item = &'a MultiIndex<D>>,
        target: usize,
    ) -> Result<IndexSet<D>, HSplineError> {
        self.check_level(lv, 1, self.numlevels())?;
        if target >= lv {
            return Err(HSplineError::InvalidTargetLevel { level: lv, target });
        }
        let mut current = self.cell_parent(lv, cells)?;
        for l in (target + 1..lv).rev() {
            current = self.cell_parent(l, &current)?;
        }
        Ok(current)
    }

    /// Functions on level `lv + 1` appearing in the prolongation of the given functions.
    pub fn function_children<'a>(
        &self,
        lv: usize,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        self.check_level(lv, 0, self.numlevels().saturating_sub(1))?;
        let factors = &self.prolongations[lv];
        let mut children = IndexSet::new();
        for f in functions {
            let mut lists: [Vec<usize>; D] = std::array::from_fn(|_| Vec::new());
            for (d, list) in lists.iter_mut().enumerate() {
                *list = factors[d].children(d, f[d])?;
            }
            children.extend(product_of_lists(lists));
        }
        Ok(children)
    }

    /// Descendant functions on `target` of functions on level `lv`.
    pub fn function_grandchildren<'a>(
        &self,
        lv: usize,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
        target: usize,
    ) -> Result<IndexSet<D>, HSplineError> {
        if !(lv < target && target < self.numlevels()) {
            return Err(HSplineError::InvalidTargetLevel { level: lv, target });
        }
        let mut current = self.function_children(lv, functions)?;
        for l in lv + 1..target {
            current = self.function_children(l, &current)?;
        }
        Ok(current)
    }

    /// Functions on level `lv - 1` whose prolongation involves the given functions.
    pub fn function_parents<'a>(
        &self,
        lv: usize,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        self.check_level(lv, 1, self.numlevels())?;
        let factors = &self.prolongations[lv - 1];
        let mut parents = IndexSet::new();
        for f in functions {
            let mut lists: [Vec<usize>; D] = std::array::from_fn(|_| Vec::new());
            for (d, list) in lists.iter_mut().enumerate() {
                *list = factors[d].parents(d, f[d])?;
            }
            parents.extend(product_of_lists(lists));
        }
        Ok(parents)
    }

    /// Ancestor functions on `target` of functions on level `lv`, with `target < lv`.
    pub fn function_grandparents<'a>(
        &self,
        lv: usize,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
        target: usize,
    ) -> Result<IndexSet<D>, HSplineError> {
        if target >= lv {
            return Err(HSplineError::InvalidTargetLevel { level: lv, target });
        }
        let mut current = self.function_parents(lv, functions)?;
        for l in (target + 1..lv).rev() {
            current = self.function_parents(l, &current)?;
        }
        Ok(current)
    }

    fn represented(&self, lv: usize) -> IndexSet<D> {
        self.active[lv].union(&self.deactivated[lv]).copied().collect()
    }

    /// Active cells on levels `>= lv` covering represented cells of level `lv`.
    fn resolve_downwards(&self, lv: usize, cells: IndexSet<D>, out: &mut LevelSets<D>) -> Result<(), HSplineError> {
        let mut level = lv;
        let mut pending = cells;
        while !pending.is_empty() {
            let (hit, rest): (IndexSet<D>, IndexSet<D>) =
                pending.into_iter().partition(|c| self.active[level].contains(c));
            out.entry(level).or_default().extend(hit);
            if rest.is_empty() {
                break;
            }
            if level + 1 >= self.numlevels() {
                return Err(HSplineError::UnresolvedCells { level });
            }
            pending = self.cell_children(level, &rest)?;
            level += 1;
        }
        Ok(())
    }

    /// Active cells on levels `<= lv` covering unrepresented cells of level `lv`.
    fn resolve_upwards(&self, lv: usize, cells: IndexSet<D>, out: &mut LevelSets<D>) -> Result<(), HSplineError> {
        let mut level = lv;
        let mut pending = cells;
        while !pending.is_empty() {
            let (hit, rest): (IndexSet<D>, IndexSet<D>) =
                pending.into_iter().partition(|c| self.active[level].contains(c));
            out.entry(level).or_default().extend(hit);
            if rest.is_empty() {
                break;
            }
            if level == 0 {
                return Err(HSplineError::UnresolvedCells { level });
            }
            pending = self.cell_parent(level, &rest)?;
            level -= 1;
        }
        Ok(())
    }

    /// Smallest collection of active cells covering the given (not necessarily
    /// active) cells. Empty levels are omitted from the result.
    pub fn hmesh_cells(&self, marked: &LevelSets<D>) -> Result<LevelSets<D>, HSplineError> {
        let mut out = LevelSets::new();
        for (&lv, cells) in marked {
            self.check_level(lv, 0, self.numlevels())?;
            for c in cells {
                self.meshes[lv].check_cell(c)?;
            }
            let represented = self.represented(lv);
            let (inside, outside): (IndexSet<D>, IndexSet<D>) =
                cells.iter().partition(|c| represented.contains(*c));
            self.resolve_downwards(lv, inside, &mut out)?;
            self.resolve_upwards(lv, outside, &mut out)?;
        }
        out.retain(|_, cells| !cells.is_empty());
        Ok(out)
    }

    /// Check that every marked level exists and every marked cell is active there.
    pub fn validate_marked(&self, marked: &LevelSets<D>) -> Result<(), HSplineError> {
        for (&lv, cells) in marked {
            self.check_level(lv, 0, self.numlevels())?;
            if let Some(c) = cells.iter().find(|c| !self.active[lv].contains(*c)) {
                return Err(HSplineError::CellNotActive {
                    level: lv,
                    cell: c.to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Deactivate the marked cells and activate their children.
    ///
    /// Returns, for every level `1..numlevels`, the cells created on it.
    /// Nothing is mutated if validation of `marked` fails.
    pub fn refine(&mut self, marked: &LevelSets<D>) -> Result<LevelSets<D>, HSplineError> {
        self.validate_marked(marked)?;
        let Some(&finest_marked) = marked.keys().next_back() else {
            return Ok(LevelSets::new());
        };
        // refining on level l needs level l + 1
        self.ensure_levels(finest_marked + 2)?;

        let empty = IndexSet::new();
        let mut new_cells = LevelSets::new();
        for lv in 0..self.numlevels() - 1 {
            let cells = marked.get(&lv).unwrap_or(&empty);
            let children = self.cell_children(lv, cells)?;
            for c in cells {
                self.active[lv].remove(c);
                self.deactivated[lv].insert(*c);
            }
            self.active[lv + 1].extend(children.iter().copied());
            new_cells.insert(lv + 1, children);
        }
        log::debug!(
            "hierarchical mesh: refined {} cells on {} levels",
            marked.values().map(|c| c.len()).sum::<usize>(),
            marked.len()
        );
        crate::debug_invariants!(self.validate_invariants(), "HMesh::refine");
        Ok(new_cells)
    }

    /// Independent copy of the hierarchy after replaying only the
    /// deactivations of levels `< level`; the copy has `level + 1` levels.
    pub fn virtual_mesh(&self, level: usize) -> Result<Self, HSplineError> {
        self.check_level(level, 0, self.numlevels())?;
        let mut out = Self {
            meshes: self.meshes[..=level].to_vec(),
            active: vec![IndexSet::new(); level + 1],
            deactivated: vec![IndexSet::new(); level + 1],
            prolongations: self.prolongations[..level].to_vec(),
        };
        out.active[0] = out.meshes[0].cells().collect();
        for i in 0..level {
            let step = LevelSets::from([(i, self.deactivated[i].clone())]);
            out.refine(&step)?;
        }
        Ok(out)
    }
}

impl<const D: usize> DebugInvariants for HMesh<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "HMesh");
    }

    fn validate_invariants(&self) -> Result<(), HSplineError> {
        let n = self.meshes.len();
        if self.active.len() != n || self.deactivated.len() != n || self.prolongations.len() + 1 != n {
            return Err(HSplineError::BrokenInvariant(
                "per-level storage is misaligned".into(),
            ));
        }
        for lv in 0..n {
            if let Some(c) = self.active[lv].intersection(&self.deactivated[lv]).next() {
                return Err(HSplineError::BrokenInvariant(format!(
                    "cell {c:?} on level {lv} is both active and deactivated"
                )));
            }
            if self.deactivated[lv].is_empty() {
                continue;
            }
            if lv + 1 == n {
                return Err(HSplineError::BrokenInvariant(format!(
                    "finest level {lv} has deactivated cells"
                )));
            }
            let fine = self.represented(lv + 1);
            let children = self.cell_children(lv, &self.deactivated[lv])?;
            if let Some(c) = children.iter().find(|c| !fine.contains(*c)) {
                return Err(HSplineError::BrokenInvariant(format!(
                    "child {c:?} of a deactivated cell is missing on level {}",
                    lv + 1
                )));
            }
        }
        Ok(())
    }
}
