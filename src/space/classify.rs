//! Index classifications of a hierarchical space for level-by-level assembly.
//!
//! A [`Classification`] is indexed as `[lv][i]`: for the virtual hierarchy
//! that ends on level `lv`, the ordered multi-indices of level `i` that take
//! part under a given [`IndexStrategy`]. On `i == lv` the active functions
//! come first, followed by the deactivated ones; every other list is sorted.
//! All strategies except [`IndexStrategy::Dirichlet`] leave out the Dirichlet
//! functions of the same `(lv, i)` slot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::HSpace;
use crate::cache::CacheRef;
use crate::hspline_error::HSplineError;
use crate::mesh::multi_index::{IndexSet, LevelSets, MultiIndex, ravel_all};

/// Per virtual level, per contributing level, the ordered multi-indices.
pub type Classification<const D: usize> = Vec<Vec<Vec<MultiIndex<D>>>>;

/// How the functions of coarser levels are selected for a virtual level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// Functions on the boundary facets of the space.
    Dirichlet,
    /// Functions of the virtual level itself.
    New,
    /// Coarser active functions whose chain of children still reaches the
    /// virtual level.
    Trunc,
    /// Coarser active functions that are ancestors of the virtual level's
    /// active functions.
    FuncSupp,
    /// Coarser active functions supported on the ancestors of the support
    /// of the virtual level's active functions.
    CellSupp,
    /// Every active function, plus the deactivated ones of the virtual level.
    Global,
}

impl IndexStrategy {
    pub const ALL: [IndexStrategy; 6] = [
        IndexStrategy::Dirichlet,
        IndexStrategy::New,
        IndexStrategy::Trunc,
        IndexStrategy::FuncSupp,
        IndexStrategy::CellSupp,
        IndexStrategy::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStrategy::Dirichlet => "dirichlet",
            IndexStrategy::New => "new",
            IndexStrategy::Trunc => "trunc",
            IndexStrategy::FuncSupp => "func_supp",
            IndexStrategy::CellSupp => "cell_supp",
            IndexStrategy::Global => "global",
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexStrategy {
    type Err = HSplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| HSplineError::UnknownStrategy(s.to_string()))
    }
}

fn empty_classification<const D: usize>(levels: usize) -> Classification<D> {
    vec![vec![Vec::new(); levels]; levels]
}

fn as_set<const D: usize>(list: &[MultiIndex<D>]) -> IndexSet<D> {
    list.iter().copied().collect()
}

impl<const D: usize> HSpace<D> {
    /// Classification of the functions under `strategy`.
    pub fn classify(&self, strategy: IndexStrategy) -> Result<Classification<D>, HSplineError> {
        match strategy {
            IndexStrategy::Dirichlet => Ok(self.dirichlet_classification()?.clone()),
            IndexStrategy::New => self.new_indices(),
            IndexStrategy::Trunc => self.trunc_indices(),
            IndexStrategy::FuncSupp => self.func_supp_indices(),
            IndexStrategy::CellSupp => self.cell_supp_indices(),
            IndexStrategy::Global => Ok(self.global_classification()?.clone()),
        }
    }

    /// [`classify`](Self::classify) with every multi-index raveled on its level.
    pub fn ravel(&self, strategy: IndexStrategy) -> Result<Vec<Vec<Vec<usize>>>, HSplineError> {
        match strategy {
            IndexStrategy::Dirichlet => {
                let class = self.dirichlet_classification()?;
                Ok(self.ravel_classification(&class))
            }
            IndexStrategy::Global => {
                let class = self.global_classification()?;
                Ok(self.ravel_classification(&class))
            }
            other => Ok(self.ravel_classification(&self.classify(other)?)),
        }
    }

    fn ravel_classification(&self, class: &Classification<D>) -> Vec<Vec<Vec<usize>>> {
        class
            .iter()
            .map(|per_level| {
                per_level
                    .iter()
                    .zip(self.hmesh.meshes())
                    .map(|(list, mesh)| ravel_all(list, &mesh.numdofs()))
                    .collect()
            })
            .collect()
    }

    /// For every virtual level, the positions of the `strategy` functions
    /// within the concatenated [`IndexStrategy::Global`] lists of that level.
    pub fn smooth_indices(&self, strategy: IndexStrategy) -> Result<Vec<Vec<usize>>, HSplineError> {
        let available = self.ravel(IndexStrategy::Global)?;
        let chosen = self.ravel(strategy)?;
        let mut out = Vec::with_capacity(available.len());
        for (avail_lv, chosen_lv) in available.iter().zip(&chosen) {
            let mut positions = Vec::new();
            let mut offset = 0;
            for (l, (avail, wanted)) in avail_lv.iter().zip(chosen_lv).enumerate() {
                let mut start = 0;
                for &index in wanted {
                    let pos = avail[start..]
                        .iter()
                        .position(|&a| a == index)
                        .ok_or(HSplineError::IndexNotFound { level: l, index })?;
                    start += pos;
                    positions.push(offset + start);
                }
                offset += avail.len();
            }
            out.push(positions);
        }
        Ok(out)
    }

    /// For every virtual level, the smallest set of active cells of the
    /// virtual mesh covering the supports of the classified functions.
    pub fn classification_cells(&self, strategy: IndexStrategy) -> Result<Vec<LevelSets<D>>, HSplineError> {
        let class = self.classify(strategy)?;
        let mut out = Vec::with_capacity(class.len());
        for (lv, per_level) in class.iter().enumerate() {
            let mut wanted = LevelSets::new();
            for (l, funcs) in per_level.iter().enumerate() {
                let cells = self.hmesh.mesh(l)?.support(funcs)?;
                if !cells.is_empty() {
                    wanted.insert(l, cells);
                }
            }
            out.push(self.hmesh.virtual_mesh(lv)?.hmesh_cells(&wanted)?);
        }
        Ok(out)
    }

    fn is_dirichlet(&self, lv: usize, f: &MultiIndex<D>) -> bool {
        let numdofs = self.hmesh.meshes()[lv].numdofs();
        self.options.boundary.iter().any(|b| b.contains(f, &numdofs))
    }

    fn boundary_part(&self, lv: usize, set: &IndexSet<D>) -> Vec<MultiIndex<D>> {
        set.iter().filter(|f| self.is_dirichlet(lv, f)).copied().collect()
    }

    fn dirichlet_classification(&self) -> Result<CacheRef<'_, Classification<D>>, HSplineError> {
        self.dirichlet.get_or_try_init(self.generation, || {
            let n = self.numlevels();
            let mut out = empty_classification(n);
            for lv in 0..n {
                for i in 0..lv {
                    out[lv][i] = self.boundary_part(i, &self.actfun[i]);
                }
                let mut own = self.boundary_part(lv, &self.actfun[lv]);
                own.extend(self.boundary_part(lv, &self.deactfun[lv]));
                out[lv][lv] = own;
            }
            Ok(out)
        })
    }

    fn global_classification(&self) -> Result<CacheRef<'_, Classification<D>>, HSplineError> {
        self.global.get_or_try_init(self.generation, || {
            let n = self.numlevels();
            let mut out = empty_classification(n);
            for lv in 0..n {
                for i in 0..lv {
                    out[lv][i] = self.actfun[i].iter().copied().collect();
                }
                out[lv][lv] = self.actfun[lv]
                    .iter()
                    .chain(&self.deactfun[lv])
                    .copied()
                    .collect();
            }
            Ok::<_, HSplineError>(out)
        })
    }

    fn new_indices(&self) -> Result<Classification<D>, HSplineError> {
        let dir = self.dirichlet_classification()?;
        let n = self.numlevels();
        let mut out = empty_classification(n);
        for lv in 0..n {
            let excluded = as_set(&dir[lv][lv]);
            out[lv][lv] = self.actfun[lv]
                .difference(&excluded)
                .chain(self.deactfun[lv].difference(&excluded))
                .copied()
                .collect();
        }
        Ok(out)
    }

    /// Each active function of level `i` keeps a frontier of descendants that
    /// has not yet met a represented function; it is selected on level `lv`
    /// when its frontier reaches an active or deactivated function there.
    fn trunc_indices(&self) -> Result<Classification<D>, HSplineError> {
        let dir = self.dirichlet_classification()?;
        let mut out = self.new_indices()?;
        let n = self.numlevels();
        let mut frontiers: Vec<BTreeMap<MultiIndex<D>, IndexSet<D>>> = vec![BTreeMap::new(); n];
        for lv in 0..n {
            let represented: IndexSet<D> = self.actfun[lv].union(&self.deactfun[lv]).copied().collect();
            for i in 0..lv {
                if !self.options.within_disparity(i, lv) {
                    continue;
                }
                let mut hit = IndexSet::new();
                for (j, frontier) in frontiers[i].iter_mut() {
                    let children = self.hmesh.function_children(lv - 1, &*frontier)?;
                    let (reached, rest): (IndexSet<D>, IndexSet<D>) =
                        children.into_iter().partition(|c| represented.contains(c));
                    if !reached.is_empty() {
                        hit.insert(*j);
                    }
                    *frontier = rest;
                }
                out[lv][i] = hit.difference(&as_set(&dir[lv][i])).copied().collect();
            }
            frontiers[lv] = self.actfun[lv]
                .iter()
                .map(|&j| (j, IndexSet::from([j])))
                .collect();
        }
        Ok(out)
    }

    fn func_supp_indices(&self) -> Result<Classification<D>, HSplineError> {
        let dir = self.dirichlet_classification()?;
        let mut out = self.new_indices()?;
        let n = self.numlevels();
        for lv in 0..n {
            for i in 0..lv {
                if !self.options.within_disparity(i, lv) {
                    continue;
                }
                let ancestors = self.hmesh.function_grandparents(lv, &self.actfun[lv], i)?;
                let excluded = as_set(&dir[lv][i]);
                out[lv][i] = ancestors
                    .intersection(&self.actfun[i])
                    .filter(|f| !excluded.contains(*f))
                    .copied()
                    .collect();
            }
        }
        Ok(out)
    }

    fn cell_supp_indices(&self) -> Result<Classification<D>, HSplineError> {
        let dir = self.dirichlet_classification()?;
        let mut out = self.new_indices()?;
        let n = self.numlevels();
        for lv in 0..n {
            let supp = self.hmesh.mesh(lv)?.support(&self.actfun[lv])?;
            for i in 0..lv {
                if !self.options.within_disparity(i, lv) {
                    continue;
                }
                let ancestors = self.hmesh.cell_grandparent(lv, &supp, i)?;
                let funcs = self.hmesh.mesh(i)?.supported_in(&ancestors)?;
                let excluded = as_set(&dir[lv][i]);
                out[lv][i] = funcs
                    .intersection(&self.actfun[i])
                    .filter(|f| !excluded.contains(*f))
                    .copied()
                    .collect();
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bspline::make_knots;
    use crate::space::{BoundarySpec, HSpaceOptions, Side};

    fn two_step_1d(boundary: bool) -> HSpace<1> {
        let mut opts = HSpaceOptions::default();
        if boundary {
            opts = opts.with_boundary([BoundarySpec::new(0, Side::Lower), BoundarySpec::new(0, Side::Upper)]);
        }
        let mut hs = HSpace::with_options([make_knots(2, 0.0, 1.0, 4).unwrap()], opts).unwrap();
        hs.refine_region(0, |x| 0.25 < x[0] && x[0] < 0.75).unwrap();
        hs.refine_region(1, |x| 0.375 < x[0] && x[0] < 0.625).unwrap();
        hs
    }

    fn idx(list: &[usize]) -> Vec<[usize; 1]> {
        list.iter().map(|&i| [i]).collect()
    }

    #[test]
    fn strategy_names_round_trip() {
        for s in IndexStrategy::ALL {
            assert_eq!(s.to_string().parse::<IndexStrategy>().unwrap(), s);
        }
        assert_eq!("func_supp".parse::<IndexStrategy>().unwrap(), IndexStrategy::FuncSupp);
        assert_eq!(
            "eval".parse::<IndexStrategy>(),
            Err(HSplineError::UnknownStrategy("eval".into()))
        );
        assert_eq!(serde_json::to_string(&IndexStrategy::CellSupp).unwrap(), "\"cell_supp\"");
    }

    #[test]
    fn dirichlet_and_new() {
        let hs = two_step_1d(true);
        let dir = hs.classify(IndexStrategy::Dirichlet).unwrap();
        assert_eq!(dir[0][0], idx(&[0, 5]));
        assert_eq!(dir[2][0], idx(&[0, 5]));
        assert!(dir[2][1].is_empty() && dir[2][2].is_empty());
        assert!(dir[0][1].is_empty());

        let new = hs.classify(IndexStrategy::New).unwrap();
        assert_eq!(new[0][0], idx(&[1, 2, 3, 4]));
        assert_eq!(new[1][1], idx(&[4, 5]));
        assert_eq!(new[2][2], idx(&[8, 9]));
        assert!(new[2][0].is_empty());
    }

    #[test]
    fn coarse_level_strategies() {
        let hs = two_step_1d(true);
        let trunc = hs.classify(IndexStrategy::Trunc).unwrap();
        assert_eq!(trunc[1][0], idx(&[2, 3]));
        assert!(trunc[2][0].is_empty());
        assert_eq!(trunc[2][1], idx(&[4, 5]));

        let fs = hs.classify(IndexStrategy::FuncSupp).unwrap();
        assert_eq!(fs[1][0], idx(&[2, 3]));
        assert_eq!(fs[2][0], idx(&[2, 3]));
        assert_eq!(fs[2][1], idx(&[4, 5]));

        let cs = hs.classify(IndexStrategy::CellSupp).unwrap();
        assert_eq!(cs[1][0], idx(&[1, 2, 3, 4]));
        assert_eq!(cs[2][0], idx(&[1, 2, 3, 4]));
        assert_eq!(cs[2][1], idx(&[4, 5]));
    }

    #[test]
    fn global_lists_everything_up_to_the_virtual_level() {
        let hs = two_step_1d(false);
        let global = hs.ravel(IndexStrategy::Global).unwrap();
        assert_eq!(global[0], vec![vec![0, 1, 2, 3, 4, 5], vec![], vec![]]);
        assert_eq!(global[2], vec![vec![0, 1, 2, 3, 4, 5], vec![4, 5], vec![8, 9]]);
    }

    #[test]
    fn smooth_indices_are_positions_in_global_lists() {
        let hs = two_step_1d(true);
        let new = hs.smooth_indices(IndexStrategy::New).unwrap();
        assert_eq!(new, vec![vec![1, 2, 3, 4], vec![6, 7], vec![8, 9]]);
        let trunc = hs.smooth_indices(IndexStrategy::Trunc).unwrap();
        assert_eq!(trunc[1], vec![2, 3, 6, 7]);
        assert_eq!(trunc[2], vec![6, 7, 8, 9]);
        let dir = hs.smooth_indices(IndexStrategy::Dirichlet).unwrap();
        assert_eq!(dir[1], vec![0, 5]);
    }

    #[test]
    fn classification_cells_resolve_on_virtual_meshes() {
        let hs = two_step_1d(false);
        let cells = hs.classification_cells(IndexStrategy::Global).unwrap();
        assert_eq!(cells[0], LevelSets::from([(0, (0..4).map(|i| [i]).collect())]));
        assert_eq!(
            cells[1],
            LevelSets::from([
                (0, IndexSet::from([[0], [3]])),
                (1, IndexSet::from([[2], [3], [4], [5]])),
            ])
        );
        let new = hs.classification_cells(IndexStrategy::New).unwrap();
        assert_eq!(new[2], LevelSets::from([(2, IndexSet::from([[6], [7], [8], [9]]))]));
    }

    #[test]
    fn classification_cells_cover_coarse_levels_under_finite_disparity() {
        let kv = make_knots(2, 0.0, 1.0, 8).unwrap();
        let mut hs = HSpace::with_options([kv], HSpaceOptions::default().with_disparity(1)).unwrap();
        hs.refine_region(0, |x| x[0] < 0.5).unwrap();
        hs.refine_region(1, |x| x[0] < 0.125).unwrap();
        let global = hs.classify(IndexStrategy::Global).unwrap();
        assert!(!global[2][0].is_empty());

        let cells = hs.classification_cells(IndexStrategy::Global).unwrap();
        assert_eq!(cells[2].get(&0), Some(&IndexSet::from([[4], [5], [6], [7]])));
        let mut covered = 0.0;
        for (&l, level_cells) in &cells[2] {
            for c in level_cells {
                let [(lo, hi)] = hs.mesh(l).unwrap().cell_extents(c).unwrap();
                covered += hi - lo;
            }
        }
        assert!((covered - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cached_classifications_follow_refinement() {
        let mut hs = two_step_1d(false);
        let before = hs.classify(IndexStrategy::Global).unwrap();
        assert_eq!(before.len(), 3);
        let marked = LevelSets::from([(2, IndexSet::from([[6], [7], [8], [9]]))]);
        hs.refine(&marked, false).unwrap();
        let after = hs.classify(IndexStrategy::Global).unwrap();
        assert_eq!(after.len(), 4);
        assert!(after[3][2].is_empty());
        assert_eq!(after[3][3], idx(&[14, 15, 16, 17, 18, 19]));
    }
}
