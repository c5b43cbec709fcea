//! Univariate knot vectors and B-spline bases.
//!
//! This is the one-dimensional engine underneath the tensor product and
//! hierarchical meshes: it knows the number of basis functions, where each of
//! them is supported, how to bisect a knot vector and how to express coarse
//! basis functions in a refined basis (see [`prolongation`]).

mod prolongation;

pub use prolongation::prolongation;

use crate::hspline_error::HSplineError;
use serde::{Deserialize, Serialize};

/// A non-decreasing sequence of knots together with a spline degree.
///
/// Breakpoints (the distinct knot values inside the spline domain) are
/// cached on construction; the knot vector is immutable afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KnotVectorRepr", into = "KnotVectorRepr")]
pub struct KnotVector {
    knots: Vec<f64>,
    degree: usize,
    breaks: Vec<f64>,
}

#[derive(Clone, Serialize, Deserialize)]
struct KnotVectorRepr {
    knots: Vec<f64>,
    degree: usize,
}

impl TryFrom<KnotVectorRepr> for KnotVector {
    type Error = HSplineError;

    fn try_from(repr: KnotVectorRepr) -> Result<Self, Self::Error> {
        KnotVector::new(repr.knots, repr.degree)
    }
}

impl From<KnotVector> for KnotVectorRepr {
    fn from(kv: KnotVector) -> Self {
        Self {
            knots: kv.knots,
            degree: kv.degree,
        }
    }
}

impl KnotVector {
    /// Create a knot vector of the given degree.
    ///
    /// The knots must be finite and non-decreasing, there must be at least
    /// `2 * (degree + 1)` of them, the spline domain must be nonempty and no
    /// knot may be repeated more than `degree + 1` times.
    pub fn new(knots: Vec<f64>, degree: usize) -> Result<Self, HSplineError> {
        if knots.len() < 2 * (degree + 1) {
            return Err(HSplineError::InvalidKnotVector(format!(
                "{} knots are too few for degree {degree}",
                knots.len()
            )));
        }
        if knots.iter().any(|t| !t.is_finite()) {
            return Err(HSplineError::InvalidKnotVector(
                "knots must be finite".into(),
            ));
        }
        if knots.windows(2).any(|w| w[0] > w[1]) {
            return Err(HSplineError::InvalidKnotVector(
                "knots must be non-decreasing".into(),
            ));
        }
        let mut run = 1;
        for w in knots.windows(2) {
            run = if w[0] == w[1] { run + 1 } else { 1 };
            if run > degree + 1 {
                return Err(HSplineError::InvalidKnotVector(format!(
                    "knot {} has multiplicity above {}",
                    w[1],
                    degree + 1
                )));
            }
        }
        let n = knots.len();
        if knots[degree] >= knots[n - degree - 1] {
            return Err(HSplineError::InvalidKnotVector(
                "spline domain is empty".into(),
            ));
        }
        let mut breaks: Vec<f64> = knots[degree..n - degree].to_vec();
        breaks.dedup();
        Ok(Self {
            knots,
            degree,
            breaks,
        })
    }

    /// The raw knot sequence.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of knots.
    pub fn numknots(&self) -> usize {
        self.knots.len()
    }

    /// Number of basis functions (degrees of freedom).
    pub fn numdofs(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Distinct breakpoints of the spline domain, in increasing order.
    pub fn mesh(&self) -> &[f64] {
        &self.breaks
    }

    /// Number of nonempty knot spans (cells) of the spline domain.
    pub fn numspans(&self) -> usize {
        self.breaks.len() - 1
    }

    /// First and last point of the spline domain.
    pub fn support(&self) -> (f64, f64) {
        (self.breaks[0], self.breaks[self.breaks.len() - 1])
    }

    /// Half-open range `(lo, hi)` of cells on which basis function `j` is nonzero.
    pub fn mesh_support_idx(&self, j: usize) -> Result<(usize, usize), HSplineError> {
        if j >= self.numdofs() {
            return Err(HSplineError::IndexOutOfRange {
                axis: 0,
                index: j,
                extent: self.numdofs(),
            });
        }
        let lo = self.breaks.partition_point(|&x| x < self.knots[j]);
        let hi = self
            .breaks
            .partition_point(|&x| x < self.knots[j + self.degree + 1]);
        Ok((lo.min(self.numspans()), hi.min(self.numspans())))
    }

    /// Supported cell ranges of all basis functions, indexed by function.
    pub fn mesh_support_idx_all(&self) -> Vec<(usize, usize)> {
        (0..self.numdofs())
            .map(|j| {
                let lo = self.breaks.partition_point(|&x| x < self.knots[j]);
                let hi = self
                    .breaks
                    .partition_point(|&x| x < self.knots[j + self.degree + 1]);
                (lo.min(self.numspans()), hi.min(self.numspans()))
            })
            .collect()
    }

    /// Uniformly bisect every cell by inserting its midpoint once.
    pub fn refine(&self) -> KnotVector {
        let mut knots = self.knots.clone();
        knots.extend(self.breaks.windows(2).map(|w| 0.5 * (w[0] + w[1])));
        knots.sort_by(f64::total_cmp);
        let mut breaks = Vec::with_capacity(2 * self.breaks.len() - 1);
        for w in self.breaks.windows(2) {
            breaks.push(w[0]);
            breaks.push(0.5 * (w[0] + w[1]));
        }
        breaks.extend(self.breaks.last().copied());
        KnotVector {
            knots,
            degree: self.degree,
            breaks,
        }
    }

    /// Index `k` of the knot span with `knots[k] <= x < knots[k + 1]`,
    /// clamped to the spline domain so that the right endpoint is included.
    pub fn find_span(&self, x: f64) -> Result<usize, HSplineError> {
        let (a, b) = self.support();
        if !(a..=b).contains(&x) {
            return Err(HSplineError::InvalidKnotVector(format!(
                "point {x} outside the spline domain [{a}, {b}]"
            )));
        }
        let n = self.numdofs();
        let k = self.knots.partition_point(|&t| t <= x).saturating_sub(1);
        Ok(k.clamp(self.degree, n - 1))
    }

    /// Evaluate all basis functions that do not vanish at `x`.
    ///
    /// Returns the index of the first nonzero function and the `degree + 1`
    /// values in order.
    pub fn eval_nonzero(&self, x: f64) -> Result<(usize, Vec<f64>), HSplineError> {
        let p = self.degree;
        let k = self.find_span(x)?;
        let t = &self.knots;
        let mut values = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        values[0] = 1.0;
        for j in 1..=p {
            left[j] = x - t[k + 1 - j];
            right[j] = t[k + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = values[r] / (right[r + 1] + left[j - r]);
                values[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            values[j] = saved;
        }
        Ok((k - p, values))
    }
}

/// Open uniform knot vector of degree `p` with `n` equal intervals on `[a, b]`.
pub fn make_knots(p: usize, a: f64, b: f64, n: usize) -> Result<KnotVector, HSplineError> {
    if n == 0 || !(a < b) {
        return Err(HSplineError::InvalidKnotVector(format!(
            "cannot split [{a}, {b}] into {n} intervals"
        )));
    }
    let mut knots = vec![a; p];
    knots.extend((0..=n).map(|i| a + (b - a) * (i as f64) / (n as f64)));
    knots.extend(std::iter::repeat_n(b, p));
    KnotVector::new(knots, p)
}
