#![allow(dead_code)]
use nalgebra::DVector;
use thb_splines::prelude::*;

/// Space over `[0,1]^D` with `n` uniform spans of degree `p` per axis.
pub fn uniform_space<const D: usize>(p: usize, n: usize) -> HSpace<D> {
    let kv = make_knots(p, 0.0, 1.0, n).unwrap();
    HSpace::new(std::array::from_fn(|_| kv.clone())).unwrap()
}

/// Same as [`uniform_space`], with options.
pub fn uniform_space_with<const D: usize>(p: usize, n: usize, options: HSpaceOptions) -> HSpace<D> {
    let kv = make_knots(p, 0.0, 1.0, n).unwrap();
    HSpace::with_options(std::array::from_fn(|_| kv.clone()), options).unwrap()
}

/// Marked cells on a single level.
pub fn marked<const D: usize>(lv: usize, cells: &[[usize; D]]) -> LevelSets<D> {
    LevelSets::from([(lv, cells.iter().copied().collect::<IndexSet<D>>())])
}

/// Sum of the volumes of all active cells.
pub fn active_volume<const D: usize>(hs: &HSpace<D>) -> f64 {
    let mut total = 0.0;
    for lv in 0..hs.numlevels() {
        for c in hs.active_cells(lv).unwrap() {
            let ext = hs.cell_extents(lv, c).unwrap();
            total += ext.iter().map(|(lo, hi)| hi - lo).product::<f64>();
        }
    }
    total
}

/// Assert that no active cell has an active ancestor.
pub fn assert_active_cells_disjoint<const D: usize>(hs: &HSpace<D>) {
    let hm = hs.hmesh();
    for m in 1..hs.numlevels() {
        for c in hs.active_cells(m).unwrap() {
            for j in 0..m {
                let anc = hm.cell_grandparent(m, [c], j).unwrap();
                assert!(
                    anc.is_disjoint(hs.active_cells(j).unwrap()),
                    "active cell {c:?} on level {m} has an active ancestor on level {j}"
                );
            }
        }
    }
}

/// Evaluate the fine-level coefficients `coeffs` on a uniform `k^D` grid.
pub fn grid_values<const D: usize>(hs: &HSpace<D>, coeffs: &DVector<f64>, k: usize) -> Vec<f64> {
    let fine = hs.hmesh().finest();
    let pts: Vec<f64> = (0..k).map(|i| i as f64 / (k - 1) as f64).collect();
    let mut out = Vec::new();
    let mut idx = [0usize; D];
    loop {
        let x: [f64; D] = std::array::from_fn(|d| pts[idx[d]]);
        out.push(fine.evaluate(coeffs.as_slice(), &x).unwrap());
        let mut d = D;
        loop {
            if d == 0 {
                return out;
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < k {
                break;
            }
            idx[d] = 0;
        }
    }
}

/// Largest level difference between an active cell and an active function
/// that does not vanish on it.
pub fn max_level_gap<const D: usize>(hs: &HSpace<D>) -> usize {
    let hm = hs.hmesh();
    let mut gap = 0;
    for j in 0..hs.numlevels() {
        let mesh = hs.mesh(j).unwrap();
        let supp = mesh.support(hs.active_functions(j).unwrap()).unwrap();
        for m in j + 1..hs.numlevels() {
            for c in hs.active_cells(m).unwrap() {
                let anc = hm.cell_grandparent(m, [c], j).unwrap();
                if anc.iter().any(|a| supp.contains(a)) {
                    gap = gap.max(m - j);
                }
            }
        }
    }
    gap
}

/// Dense copy of a sparse matrix, for comparisons in tests.
pub fn dense(m: &nalgebra_sparse::CsrMatrix<f64>) -> nalgebra::DMatrix<f64> {
    nalgebra::DMatrix::from(m)
}

/// Like [`max_level_gap`], but for the truncated basis: a function counts
/// on a cell only where its truncation does not vanish.
pub fn max_truncated_level_gap<const D: usize>(hs: &HSpace<D>) -> usize {
    let hm = hs.hmesh();
    let finest_level = hs.numlevels() - 1;
    let fine = hm.finest();
    let r = hs.represent_fine(true).unwrap();

    let mut level_of_column = Vec::with_capacity(hs.numdofs());
    for (lv, n) in hs.numactive().into_iter().enumerate() {
        level_of_column.extend(std::iter::repeat_n(lv, n));
    }
    let mut supports: Vec<IndexSet<D>> = vec![IndexSet::new(); hs.numlevels()];
    for (i, j, &v) in r.triplet_iter() {
        if v.abs() > 1e-14 {
            let f = thb_splines::mesh::multi_index::unravel(i, &fine.numdofs());
            supports[level_of_column[j]].extend(fine.support([&f]).unwrap());
        }
    }

    let mut gap = 0;
    for m in 1..hs.numlevels() {
        for c in hs.active_cells(m).unwrap() {
            let below: IndexSet<D> = if m == finest_level {
                IndexSet::from([*c])
            } else {
                hm.cell_grandchildren(m, [c], finest_level).unwrap()
            };
            for (j, supp) in supports.iter().enumerate().take(m) {
                if !below.is_disjoint(supp) {
                    gap = gap.max(m - j);
                }
            }
        }
    }
    gap
}
