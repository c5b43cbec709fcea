//! Fine-level representation of the HB and THB bases and the change of
//! basis between them.

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use super::HSpace;
use crate::algs::sparse::{multi_kron, prune, push_block, select_columns, zero_rows};
use crate::hspline_error::HSplineError;

/// Entries below this magnitude are treated as cancellation noise.
const DROP_TOL: f64 = 1e-14;

impl<const D: usize> HSpace<D> {
    /// The per-axis prolongation factors from level `lv` to `lv + 1`.
    pub fn tp_prolongation(&self, lv: usize) -> Result<[CsrMatrix<f64>; D], HSplineError> {
        Ok(self.hmesh.prolongation(lv)?.each_ref().map(|p| p.matrix().clone()))
    }

    /// The tensor product prolongation from level `lv` to `lv + 1`.
    pub fn tp_prolongation_kron(&self, lv: usize) -> Result<CsrMatrix<f64>, HSplineError> {
        Ok(multi_kron(self.hmesh.prolongation(lv)?.iter().map(|p| p.matrix())))
    }

    fn level_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.numlevels() + 1);
        offsets.push(0);
        for n in self.numactive() {
            offsets.push(offsets[offsets.len() - 1] + n);
        }
        offsets
    }

    /// Coefficients of all active functions in the basis of the finest
    /// tensor product mesh, as a `numbf(finest) × numdofs` matrix with the
    /// levels in order.
    ///
    /// With `truncate`, the columns hold the truncated (THB) functions:
    /// when moving one level up, components on functions that are active on
    /// the finer level are dropped.
    pub fn represent_fine(&self, truncate: bool) -> Result<CsrMatrix<f64>, HSplineError> {
        let act = self.active_indices();
        let offsets = self.level_offsets();
        let levels = self.numlevels();
        let nfine = self.hmesh.finest().numbf();

        let mut coo = CooMatrix::new(nfine, self.numdofs());
        let mut p: CsrMatrix<f64> = CsrMatrix::identity(nfine);
        for lv in (0..levels).rev() {
            if lv + 1 < levels {
                let mut pj = self.tp_prolongation_kron(lv)?;
                if truncate {
                    pj = zero_rows(&pj, &act[lv + 1]);
                }
                p = &p * &pj;
            }
            push_block(&mut coo, &select_columns(&p, &act[lv]), 0, offsets[lv]);
        }
        Ok(CsrMatrix::from(&coo))
    }

    /// Strictly block lower triangular part `M` of the THB to HB change of
    /// basis: column `j` holds the components removed from function `j` by
    /// truncation, expressed in the finer active functions.
    fn truncation_remainder(&self) -> Result<CsrMatrix<f64>, HSplineError> {
        let act = self.active_indices();
        let offsets = self.level_offsets();
        let levels = self.numlevels();
        let n = self.numdofs();

        let mut coo = CooMatrix::new(n, n);
        for k in 0..levels.saturating_sub(1) {
            let numbf = self.hmesh.mesh(k)?.numbf();
            let mut current = select_columns(&CsrMatrix::<f64>::identity(numbf), &act[k]);
            for l in k + 1..levels {
                let expanded = &self.tp_prolongation_kron(l - 1)? * &current;
                for (i, j, &v) in expanded.triplet_iter() {
                    if v.abs() <= DROP_TOL {
                        continue;
                    }
                    if let Ok(r) = act[l].binary_search(&i) {
                        coo.push(offsets[l] + r, offsets[k] + j, v);
                    }
                }
                current = zero_rows(&expanded, &act[l]);
            }
        }
        Ok(CsrMatrix::from(&coo))
    }

    /// Change of basis `T` from THB to HB coefficients:
    /// `represent_fine(false) * T == represent_fine(true)`.
    pub fn thb_to_hb(&self) -> Result<CsrMatrix<f64>, HSplineError> {
        let identity: CsrMatrix<f64> = CsrMatrix::identity(self.numdofs());
        Ok(prune(&(&identity - &self.truncation_remainder()?), DROP_TOL))
    }

    /// Inverse of [`thb_to_hb`](Self::thb_to_hb).
    ///
    /// `T = I - M` with `M` nilpotent of index at most `numlevels`, so the
    /// inverse is the finite sum `I + M + ... + M^(numlevels - 1)`.
    pub fn hb_to_thb(&self) -> Result<CsrMatrix<f64>, HSplineError> {
        let m = self.truncation_remainder()?;
        let mut term: CsrMatrix<f64> = CsrMatrix::identity(self.numdofs());
        let mut sum = term.clone();
        for _ in 1..self.numlevels() {
            term = &term * &m;
            if term.nnz() == 0 {
                break;
            }
            sum = &sum + &term;
        }
        Ok(prune(&sum, DROP_TOL))
    }
}
