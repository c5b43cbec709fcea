//! Multilevel banded matrices.
//!
//! A multilevel banded matrix is block structured on `L` levels: every block
//! is banded and the block pattern itself is banded. All potential nonzeros
//! fit into a dense tensor with one axis per level, indexed by the band
//! positions of that level (see [`compute_banded_sparsity`]).
//!
//! Level `k` contributes the band position `M_k = i + j * n_k`; the entry it
//! addresses is `(row, col) = (to_seq([M_k / n_k]), to_seq([M_k % n_k]))`,
//! the convention shared by [`MlBandedMatrix::apply`] and
//! [`MlBandedMatrix::to_sparse`].

mod reindex;

pub use reindex::{
    compute_banded_sparsity, from_seq, reindex_from_multilevel, reindex_from_reordered,
    reindex_to_multilevel, reorder, to_seq,
};

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::hspline_error::HSplineError;

/// Compact storage of a square multilevel banded matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct MlBandedMatrix {
    bs: Vec<usize>,
    bw: Vec<usize>,
    sparsity: Vec<Vec<usize>>,
    data: Vec<f64>,
}

impl MlBandedMatrix {
    /// Matrix with block sizes `bs` and bandwidths `bw`, one per level.
    ///
    /// `data` is the raveled (row-major) coefficient tensor of shape
    /// [`datashape`](Self::datashape); `None` gives the zero matrix.
    pub fn new(bs: Vec<usize>, bw: Vec<usize>, data: Option<Vec<f64>>) -> Result<Self, HSplineError> {
        if bs.is_empty() || bs.len() != bw.len() {
            return Err(HSplineError::InconsistentDimensions(format!(
                "{} block sizes and {} bandwidths",
                bs.len(),
                bw.len()
            )));
        }
        let sparsity: Vec<Vec<usize>> = bs
            .iter()
            .zip(&bw)
            .map(|(&n, &p)| compute_banded_sparsity(n, p))
            .collect();
        let size: usize = sparsity.iter().map(Vec::len).product();
        let data = data.unwrap_or_else(|| vec![0.0; size]);
        if data.len() != size {
            return Err(HSplineError::DataShapeMismatch {
                expected: size,
                found: data.len(),
            });
        }
        Ok(Self { bs, bw, sparsity, data })
    }

    pub fn block_sizes(&self) -> &[usize] {
        &self.bs
    }

    pub fn bandwidths(&self) -> &[usize] {
        &self.bw
    }

    /// Number of band positions per level.
    pub fn datashape(&self) -> Vec<usize> {
        self.sparsity.iter().map(Vec::len).collect()
    }

    /// Band positions of every level.
    pub fn sparsity(&self) -> &[Vec<usize>] {
        &self.sparsity
    }

    pub fn shape(&self) -> (usize, usize) {
        let n = self.bs.iter().product();
        (n, n)
    }

    /// Number of stored coefficients.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Every stored coefficient with its `(row, col)` position.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let shape = self.datashape();
        self.data.iter().enumerate().map(move |(flat, &v)| {
            let pos = from_seq(flat, &shape);
            let (mut i, mut j) = (0, 0);
            for ((&k, band), &n) in pos.iter().zip(&self.sparsity).zip(&self.bs) {
                let m = band[k];
                i = i * n + m / n;
                j = j * n + m % n;
            }
            (i, j, v)
        })
    }

    /// Matrix-vector product, linear in the number of stored coefficients.
    pub fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>, HSplineError> {
        let (nrows, ncols) = self.shape();
        if x.len() != ncols {
            return Err(HSplineError::LengthMismatch {
                expected: ncols,
                found: x.len(),
            });
        }
        let mut y = DVector::zeros(nrows);
        for (i, j, v) in self.entries() {
            y[i] += v * x[j];
        }
        Ok(y)
    }

    /// Sparse representation of the matrix.
    pub fn to_sparse(&self) -> CsrMatrix<f64> {
        let (nrows, ncols) = self.shape();
        let mut coo = CooMatrix::new(nrows, ncols);
        for (i, j, v) in self.entries() {
            coo.push(i, j, v);
        }
        CsrMatrix::from(&coo)
    }
}
