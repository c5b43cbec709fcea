//! Reordering and reindexing helpers for block and multilevel matrices.

use nalgebra::DMatrix;

use crate::hspline_error::HSplineError;

/// Raveled (column-major, `i + j * n`) positions of the nonzeros of a
/// square banded matrix of size `n` with bandwidth `bw`, in increasing order.
pub fn compute_banded_sparsity(n: usize, bw: usize) -> Vec<usize> {
    let mut idx = Vec::with_capacity(n * (2 * bw + 1));
    for j in 0..n {
        for i in j.saturating_sub(bw)..n.min(j + bw + 1) {
            idx.push(i + j * n);
        }
    }
    idx
}

/// Multi-index of the sequential (row-major) index `i` in a grid of shape `dims`.
pub fn from_seq(mut i: usize, dims: &[usize]) -> Vec<usize> {
    let mut out = vec![0; dims.len()];
    for k in (0..dims.len()).rev() {
        out[k] = i % dims[k];
        i /= dims[k];
    }
    out
}

/// Sequential (row-major) index of the multi-index `idx` in a grid of shape `dims`.
pub fn to_seq(idx: &[usize], dims: &[usize]) -> usize {
    idx.iter().zip(dims).fold(0, |acc, (&i, &n)| acc * n + i)
}

/// Rearrange `x`, made of `m1 × n1` blocks, so that row `i * n1 + j` of the
/// result is block `(i, j)` raveled row by row.
///
/// A Kronecker product `A ⊗ B` becomes the rank one matrix `vec(A) vec(B)^T`
/// (Van Loan and Pitsianis).
pub fn reorder(x: &DMatrix<f64>, m1: usize, n1: usize) -> Result<DMatrix<f64>, HSplineError> {
    let (m, n) = x.shape();
    if m1 == 0 || n1 == 0 || m % m1 != 0 || n % n1 != 0 {
        return Err(HSplineError::InvalidBlockSize { rows: m, cols: n, m: m1, n: n1 });
    }
    let (m2, n2) = (m / m1, n / n1);
    let mut y = DMatrix::zeros(m1 * n1, m2 * n2);
    for i in 0..m1 {
        for j in 0..n1 {
            let block = x.view((i * m2, j * n2), (m2, n2));
            for r in 0..m2 {
                for c in 0..n2 {
                    y[(i * n1 + j, r * n2 + c)] = block[(r, c)];
                }
            }
        }
    }
    Ok(y)
}

/// Position in `x` of entry `(i, j)` of `reorder(x, m1, n1)`, where the
/// blocks have size `m2 × n2`.
pub fn reindex_from_reordered(i: usize, j: usize, _m1: usize, n1: usize, m2: usize, n2: usize) -> (usize, usize) {
    let (bi0, bi1) = (i / n1, i % n1);
    let (ii0, ii1) = (j / n2, j % n2);
    (bi0 * m2 + ii0, bi1 * n2 + ii1)
}

fn check_block_sizes(levels: usize, bs: &[(usize, usize)]) -> Result<(), HSplineError> {
    if levels != bs.len() {
        return Err(HSplineError::InconsistentDimensions(format!(
            "{levels} indices for {} block levels",
            bs.len()
        )));
    }
    Ok(())
}

/// Multilevel index of entry `(i, j)` of a matrix whose level `k` blocks have
/// `bs[k] = (rows, cols)`: component `k` is the raveled position within level `k`.
pub fn reindex_to_multilevel(i: usize, j: usize, bs: &[(usize, usize)]) -> Vec<usize> {
    let rows: Vec<usize> = bs.iter().map(|b| b.0).collect();
    let cols: Vec<usize> = bs.iter().map(|b| b.1).collect();
    let (ri, cj) = (from_seq(i, &rows), from_seq(j, &cols));
    bs.iter()
        .enumerate()
        .map(|(k, b)| ri[k] * b.1 + cj[k])
        .collect()
}

/// Inverse of [`reindex_to_multilevel`].
pub fn reindex_from_multilevel(m: &[usize], bs: &[(usize, usize)]) -> Result<(usize, usize), HSplineError> {
    check_block_sizes(m.len(), bs)?;
    let (mut i, mut j) = (0, 0);
    for (&mk, &(rows, cols)) in m.iter().zip(bs) {
        i = i * rows + mk / cols;
        j = j * cols + mk % cols;
    }
    Ok((i, j))
}
