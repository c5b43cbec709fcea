//! HSplineError: Unified error type for thb-splines public APIs
//!
//! Every fallible operation in the crate reports precondition and consistency
//! violations through this enum instead of panicking.

use thiserror::Error;

/// Unified error type for hierarchical spline operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HSplineError {
    /// A level argument lies outside the valid range for the requested query.
    #[error("Invalid level {level}: expected {min} <= level < {end}")]
    InvalidLevel {
        /// Offending level.
        level: usize,
        /// Smallest admissible level.
        min: usize,
        /// One past the largest admissible level.
        end: usize,
    },
    /// The target level of a transitive query is not strictly between the bounds.
    #[error("Invalid target level {target} for query starting on level {level}")]
    InvalidTargetLevel {
        /// Level the query starts on.
        level: usize,
        /// Requested target level.
        target: usize,
    },
    /// A cell marked for refinement is not active on its level.
    #[error("Cell {cell:?} is not active on level {level}")]
    CellNotActive {
        /// Level of the cell.
        level: usize,
        /// Multi-index of the cell.
        cell: Vec<usize>,
    },
    /// A cell or function index exceeds the extent of its axis.
    #[error("Index {index} out of range on axis {axis} (extent {extent})")]
    IndexOutOfRange {
        /// Axis of the offending component.
        axis: usize,
        /// Offending index.
        index: usize,
        /// Number of entries on that axis.
        extent: usize,
    },
    /// A vector has the wrong length.
    #[error("Length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// Two related dimension descriptions disagree.
    #[error("Inconsistent dimensions: {0}")]
    InconsistentDimensions(String),
    /// A dense data tensor does not match the shape implied by its sparsity.
    #[error("Data shape mismatch: expected {expected} entries, found {found}")]
    DataShapeMismatch {
        /// Number of entries required.
        expected: usize,
        /// Number of entries supplied.
        found: usize,
    },
    /// A knot vector is malformed or two knot vectors are incompatible.
    #[error("Invalid knot vector: {0}")]
    InvalidKnotVector(String),
    /// The grading disparity must be at least one.
    #[error("Invalid disparity {0}: must be at least 1")]
    InvalidDisparity(usize),
    /// A boundary facet refers to an axis the space does not have.
    #[error("Invalid boundary facet on axis {axis} for a {dim}-dimensional space")]
    InvalidBoundary {
        /// Requested axis.
        axis: usize,
        /// Spatial dimension of the space.
        dim: usize,
    },
    /// A matrix cannot be split into the requested blocks.
    #[error("Invalid block size: {rows}x{cols} matrix is not divisible into {m}x{n} blocks")]
    InvalidBlockSize {
        /// Matrix rows.
        rows: usize,
        /// Matrix columns.
        cols: usize,
        /// Requested row blocks.
        m: usize,
        /// Requested column blocks.
        n: usize,
    },
    /// An index expected inside an ordered superset was not found there.
    #[error("Index {index} not found in the global classification of level {level}")]
    IndexNotFound {
        /// Virtual level being processed.
        level: usize,
        /// Raveled index that was missing.
        index: usize,
    },
    /// Parsing a classification strategy name failed.
    #[error("Unknown index strategy `{0}`")]
    UnknownStrategy(String),
    /// Cells could not be mapped onto active cells of the hierarchy.
    #[error("Cells on level {level} are not covered by any active cell")]
    UnresolvedCells {
        /// Level on which resolution got stuck.
        level: usize,
    },
    /// A structural invariant of the hierarchy does not hold.
    #[error("Invariant violated: {0}")]
    BrokenInvariant(String),
}
