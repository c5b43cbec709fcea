//! Tensor product B-spline meshes.
//!
//! # Expected invariants
//! - One knot vector per axis; `D >= 1`.
//! - Adjacency tables are built once and never change: for each axis, the
//!   half-open cell range supporting every function and the half-open
//!   function range supported on every cell.
//! - `support`, `supported_in` and `neighbors` return sorted, deduplicated sets.

use std::ops::Range;

use crate::bspline::KnotVector;
use crate::hspline_error::HSplineError;
use crate::mesh::multi_index::{IndexSet, MultiIndex, product, ravel};

/// One level of a hierarchical mesh: the tensor product of `D` knot vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorMesh<const D: usize> {
    kvs: [KnotVector; D],
    numspans: [usize; D],
    numdofs: [usize; D],
    /// function -> cell range, per axis
    meshsupp: [Vec<(usize, usize)>; D],
    /// cell -> function range, per axis
    suppfunc: [Vec<(usize, usize)>; D],
}

/// For each cell, the first and one-past-last function supported on it.
fn compute_supported_functions(numspans: usize, meshsupp: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut sf = vec![(meshsupp.len(), 0); numspans];
    for (j, &(lo, hi)) in meshsupp.iter().enumerate() {
        for entry in &mut sf[lo..hi] {
            entry.0 = entry.0.min(j);
            entry.1 = entry.1.max(j + 1);
        }
    }
    sf
}

impl<const D: usize> TensorMesh<D> {
    /// Build the mesh and its adjacency tables from one knot vector per axis.
    pub fn new(kvs: [KnotVector; D]) -> Result<Self, HSplineError> {
        if D == 0 {
            return Err(HSplineError::InconsistentDimensions(
                "a tensor mesh needs at least one axis".into(),
            ));
        }
        let numspans = std::array::from_fn(|d| kvs[d].numspans());
        let numdofs = std::array::from_fn(|d| kvs[d].numdofs());
        let meshsupp: [Vec<(usize, usize)>; D] = std::array::from_fn(|d| kvs[d].mesh_support_idx_all());
        let suppfunc = std::array::from_fn(|d| compute_supported_functions(numspans[d], &meshsupp[d]));
        Ok(Self {
            kvs,
            numspans,
            numdofs,
            meshsupp,
            suppfunc,
        })
    }

    /// Uniformly bisect every axis.
    pub fn refine(&self) -> Result<Self, HSplineError> {
        Self::new(std::array::from_fn(|d| self.kvs[d].refine()))
    }

    /// Knot vectors, one per axis.
    pub fn knotvectors(&self) -> &[KnotVector; D] {
        &self.kvs
    }

    /// Number of cells per axis.
    pub fn numspans(&self) -> [usize; D] {
        self.numspans
    }

    /// Total number of cells.
    pub fn numel(&self) -> usize {
        self.numspans.iter().product()
    }

    /// Number of basis functions per axis.
    pub fn numdofs(&self) -> [usize; D] {
        self.numdofs
    }

    /// Total number of basis functions.
    pub fn numbf(&self) -> usize {
        self.numdofs.iter().product()
    }

    /// All cells in lexicographic order.
    pub fn cells(&self) -> impl Iterator<Item = MultiIndex<D>> + use<D> {
        product(self.numspans.map(|n| 0..n))
    }

    /// All basis functions in lexicographic order.
    pub fn functions(&self) -> impl Iterator<Item = MultiIndex<D>> + use<D> {
        product(self.numdofs.map(|n| 0..n))
    }

    /// Raveled (row-major) index of a function.
    pub fn ravel_function(&self, f: &MultiIndex<D>) -> usize {
        ravel(f, &self.numdofs)
    }

    /// Check that `c` is a cell of this mesh.
    pub fn check_cell(&self, c: &MultiIndex<D>) -> Result<(), HSplineError> {
        check_bounds(c, &self.numspans)
    }

    /// Check that `f` is a basis function of this mesh.
    pub fn check_function(&self, f: &MultiIndex<D>) -> Result<(), HSplineError> {
        check_bounds(f, &self.numdofs)
    }

    /// Physical extents of cell `c` as one `(min, max)` pair per axis.
    pub fn cell_extents(&self, c: &MultiIndex<D>) -> Result<[(f64, f64); D], HSplineError> {
        self.check_cell(c)?;
        Ok(std::array::from_fn(|d| {
            let mesh = self.kvs[d].mesh();
            (mesh[c[d]], mesh[c[d] + 1])
        }))
    }

    /// Physical extents of the support of function `f`, one pair per axis.
    pub fn function_support(&self, f: &MultiIndex<D>) -> Result<[(f64, f64); D], HSplineError> {
        self.check_function(f)?;
        Ok(std::array::from_fn(|d| {
            let mesh = self.kvs[d].mesh();
            let (lo, hi) = self.meshsupp[d][f[d]];
            (mesh[lo], mesh[hi])
        }))
    }

    fn support_1d(&self, axis: usize, j: usize) -> Range<usize> {
        let (lo, hi) = self.meshsupp[axis][j];
        lo..hi
    }

    fn supported_in_1d(&self, axis: usize, k: usize) -> Range<usize> {
        let (lo, hi) = self.suppfunc[axis][k];
        lo..hi
    }

    /// Cells on which at least one of the given functions does not vanish.
    pub fn support<'a>(
        &self,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        let mut supp = IndexSet::new();
        for f in functions {
            self.check_function(f)?;
            supp.extend(product(std::array::from_fn(|d| self.support_1d(d, f[d]))));
        }
        Ok(supp)
    }

    /// Functions whose support intersects at least one of the given cells.
    pub fn supported_in<'a>(
        &self,
        cells: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        let mut funcs = IndexSet::new();
        for c in cells {
            self.check_cell(c)?;
            funcs.extend(product(std::array::from_fn(|d| self.supported_in_1d(d, c[d]))));
        }
        Ok(funcs)
    }

    /// Functions with nontrivial support intersection with the given ones.
    pub fn neighbors<'a>(
        &self,
        functions: impl IntoIterator<Item = &'a MultiIndex<D>>,
    ) -> Result<IndexSet<D>, HSplineError> {
        let supp = self.support(functions)?;
        self.supported_in(&supp)
    }

    /// Evaluate the spline with (raveled) coefficients `coeffs` at `x`.
    ///
    /// `x` holds one coordinate per axis, in axis order.
    pub fn evaluate(&self, coeffs: &[f64], x: &[f64; D]) -> Result<f64, HSplineError> {
        if coeffs.len() != self.numbf() {
            return Err(HSplineError::LengthMismatch {
                expected: self.numbf(),
                found: coeffs.len(),
            });
        }
        let mut local: Vec<(usize, Vec<f64>)> = Vec::with_capacity(D);
        for d in 0..D {
            local.push(self.kvs[d].eval_nonzero(x[d])?);
        }
        let ranges: [Range<usize>; D] = std::array::from_fn(|d| 0..local[d].1.len());
        let mut value = 0.0;
        for jj in product(ranges) {
            let weight: f64 = (0..D).map(|d| local[d].1[jj[d]]).product();
            let f: MultiIndex<D> = std::array::from_fn(|d| local[d].0 + jj[d]);
            value += weight * coeffs[self.ravel_function(&f)];
        }
        Ok(value)
    }
}

fn check_bounds<const D: usize>(idx: &MultiIndex<D>, extent: &[usize; D]) -> Result<(), HSplineError> {
    for (axis, (&i, &n)) in idx.iter().zip(extent).enumerate() {
        if i >= n {
            return Err(HSplineError::IndexOutOfRange {
                axis,
                index: i,
                extent: n,
            });
        }
    }
    Ok(())
}
