//! Knot insertion operators between nested knot vectors.

use super::KnotVector;
use crate::hspline_error::HSplineError;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Sparse `numdofs(fine) × numdofs(coarse)` matrix whose column `j` holds the
/// coefficients of coarse basis function `j` in the fine basis.
///
/// `fine` must contain every knot of `coarse` (with at least the same
/// multiplicity) and have the same degree. The operator is assembled by
/// inserting the missing knots one at a time (Boehm's algorithm).
pub fn prolongation(coarse: &KnotVector, fine: &KnotVector) -> Result<CsrMatrix<f64>, HSplineError> {
    let p = coarse.degree();
    if fine.degree() != p {
        return Err(HSplineError::InvalidKnotVector(format!(
            "degree mismatch: coarse {p}, fine {}",
            fine.degree()
        )));
    }
    let inserted = knot_difference(coarse.knots(), fine.knots())?;

    let n = coarse.numdofs();
    let mut knots = coarse.knots().to_vec();
    // rows[i][j]: coefficient of coarse function j on current function i
    let mut rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect();

    for x in inserted {
        let (lo, hi) = (knots[p], knots[knots.len() - p - 1]);
        if !(lo < x && x < hi) {
            return Err(HSplineError::InvalidKnotVector(format!(
                "knot {x} lies outside the open domain ({lo}, {hi})"
            )));
        }
        let k = knots.partition_point(|&t| t <= x) - 1;
        let mut next = Vec::with_capacity(rows.len() + 1);
        for i in 0..=rows.len() {
            if i + p <= k {
                next.push(rows[i].clone());
            } else if i > k {
                next.push(rows[i - 1].clone());
            } else {
                let a = (x - knots[i]) / (knots[i + p] - knots[i]);
                let blended = rows[i - 1]
                    .iter()
                    .zip(&rows[i])
                    .map(|(prev, cur)| (1.0 - a) * prev + a * cur)
                    .collect();
                next.push(blended);
            }
        }
        knots.insert(k + 1, x);
        rows = next;
    }

    let mut coo = CooMatrix::new(rows.len(), n);
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
    }
    Ok(CsrMatrix::from(&coo))
}

/// Knots of `fine` that are not matched by a knot of `coarse`, in increasing order.
fn knot_difference(coarse: &[f64], fine: &[f64]) -> Result<Vec<f64>, HSplineError> {
    let mut extra = Vec::with_capacity(fine.len().saturating_sub(coarse.len()));
    let mut c = coarse.iter().peekable();
    for &t in fine {
        match c.peek() {
            Some(&&s) if s == t => {
                c.next();
            }
            Some(&&s) if s < t => {
                return Err(HSplineError::InvalidKnotVector(format!(
                    "coarse knot {s} is missing from the fine knot vector"
                )));
            }
            _ => extra.push(t),
        }
    }
    if let Some(&s) = c.next() {
        return Err(HSplineError::InvalidKnotVector(format!(
            "coarse knot {s} is missing from the fine knot vector"
        )));
    }
    Ok(extra)
}
