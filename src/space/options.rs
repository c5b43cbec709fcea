//! Construction-time configuration of a hierarchical space.

use serde::{Deserialize, Serialize};

use crate::hspline_error::HSplineError;
use crate::mesh::multi_index::MultiIndex;

/// Which end of an axis a boundary facet sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Facet at the first breakpoint of the axis.
    Lower,
    /// Facet at the last breakpoint of the axis.
    Upper,
}

/// A boundary facet carrying Dirichlet conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundarySpec {
    pub axis: usize,
    pub side: Side,
}

impl BoundarySpec {
    pub fn new(axis: usize, side: Side) -> Self {
        Self { axis, side }
    }

    /// Whether the function `f` of a tensor product space with `numdofs`
    /// functions per axis is nonzero on this facet.
    pub fn contains<const D: usize>(&self, f: &MultiIndex<D>, numdofs: &[usize; D]) -> bool {
        match self.side {
            Side::Lower => f[self.axis] == 0,
            Side::Upper => f[self.axis] + 1 == numdofs[self.axis],
        }
    }
}

/// Options for [`HSpace`](crate::space::HSpace).
///
/// The defaults leave refinement ungraded and mark no boundary functions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HSpaceOptions {
    /// Largest allowed level difference between interacting cells; `None` is unbounded.
    pub disparity: Option<usize>,
    /// Facets whose functions are classified as Dirichlet functions.
    pub boundary: Vec<BoundarySpec>,
}

impl HSpaceOptions {
    pub fn with_disparity(mut self, disparity: usize) -> Self {
        self.disparity = Some(disparity);
        self
    }

    pub fn with_boundary(mut self, boundary: impl IntoIterator<Item = BoundarySpec>) -> Self {
        self.boundary.extend(boundary);
        self
    }

    /// Check the options against the spatial dimension `dim`.
    pub fn validate(&self, dim: usize) -> Result<(), HSplineError> {
        if self.disparity == Some(0) {
            return Err(HSplineError::InvalidDisparity(0));
        }
        if let Some(b) = self.boundary.iter().find(|b| b.axis >= dim) {
            return Err(HSplineError::InvalidBoundary { axis: b.axis, dim });
        }
        Ok(())
    }

    /// Whether level `i` interacts with level `lv > i` under the disparity bound.
    pub(crate) fn within_disparity(&self, i: usize, lv: usize) -> bool {
        i < lv && self.disparity.is_none_or(|d| lv - i <= d)
    }
}
