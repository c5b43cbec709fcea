//! Small sparse-matrix kernels on top of `nalgebra-sparse`.
//!
//! Index conventions match [`crate::mesh::multi_index::ravel`]: in a
//! Kronecker product the first factor varies slowest.

use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Kronecker product `a ⊗ b`.
pub fn kron(a: &CsrMatrix<f64>, b: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    let (mb, nb) = (b.nrows(), b.ncols());
    let mut coo = CooMatrix::new(a.nrows() * mb, a.ncols() * nb);
    for (ia, ja, &va) in a.triplet_iter() {
        for (ib, jb, &vb) in b.triplet_iter() {
            coo.push(ia * mb + ib, ja * nb + jb, va * vb);
        }
    }
    CsrMatrix::from(&coo)
}

/// Kronecker product of all factors, left to right.
///
/// An empty list yields the `1 × 1` identity.
pub fn multi_kron<'a>(factors: impl IntoIterator<Item = &'a CsrMatrix<f64>>) -> CsrMatrix<f64> {
    factors
        .into_iter()
        .fold(CsrMatrix::identity(1), |acc, f| kron(&acc, f))
}

/// Copy of `m` with the given (sorted) rows set to zero.
pub fn zero_rows(m: &CsrMatrix<f64>, sorted_rows: &[usize]) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(m.nrows(), m.ncols());
    for (i, j, &v) in m.triplet_iter() {
        if sorted_rows.binary_search(&i).is_err() {
            coo.push(i, j, v);
        }
    }
    CsrMatrix::from(&coo)
}

/// Columns of `m` listed in `sorted_cols`, in that order.
pub fn select_columns(m: &CsrMatrix<f64>, sorted_cols: &[usize]) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(m.nrows(), sorted_cols.len());
    for (i, j, &v) in m.triplet_iter() {
        if let Ok(k) = sorted_cols.binary_search(&j) {
            coo.push(i, k, v);
        }
    }
    CsrMatrix::from(&coo)
}

/// Push every entry of `block` into `coo`, shifted by `(row0, col0)`.
pub fn push_block(coo: &mut CooMatrix<f64>, block: &CsrMatrix<f64>, row0: usize, col0: usize) {
    for (i, j, &v) in block.triplet_iter() {
        coo.push(row0 + i, col0 + j, v);
    }
}

/// Copy of `m` without explicitly stored entries of magnitude `<= tol`.
pub fn prune(m: &CsrMatrix<f64>, tol: f64) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(m.nrows(), m.ncols());
    for (i, j, &v) in m.triplet_iter() {
        if v.abs() > tol {
            coo.push(i, j, v);
        }
    }
    CsrMatrix::from(&coo)
}
