#![cfg_attr(docsrs, feature(doc_cfg))]
//! # thb-splines
//!
//! thb-splines provides hierarchical B-spline (HB) and truncated hierarchical
//! B-spline (THB) spaces for adaptive isogeometric analysis: a multilevel
//! refinement structure on top of tensor product spline meshes, tracking of
//! active and deactivated cells and basis functions, index classifications
//! for level-by-level assembly, and sparse operators between levels.
//!
//! ## Features
//! - Univariate knot vectors with knot-insertion prolongation ([`bspline`])
//! - Tensor product meshes with precomputed cell/function adjacency ([`mesh::tensor`])
//! - Hierarchical meshes with cross-level cell and function relations ([`mesh::hierarchical`])
//! - HB/THB spaces with graded refinement, Dirichlet-aware index
//!   classification and fine-level representation ([`space`])
//! - Compact multilevel banded matrices and reindexing helpers ([`mlmatrix`])
//!
//! ## Usage
//! ```
//! use thb_splines::prelude::*;
//!
//! let kv = make_knots(2, 0.0, 1.0, 4)?;
//! let mut space = HSpace::new([kv.clone(), kv])?;
//! space.refine_region(0, |x| x[0] < 0.5 && x[1] < 0.5)?;
//! let r = space.represent_fine(true)?;
//! assert_eq!(r.ncols(), space.numdofs());
//! # Ok::<(), thb_splines::hspline_error::HSplineError>(())
//! ```
//!
//! ## Invariant checking
//! Mutating operations validate their input before touching any state and
//! re-check the structural invariants afterwards in debug builds, or in
//! release builds with the `strict-invariants` / `check-invariants` features
//! (see [`DebugInvariants`]).
//!
//! ## Determinism
//! Every returned collection of multi-indices is sorted lexicographically;
//! results never depend on hashing or insertion order.

pub mod algs;
pub mod bspline;
pub mod cache;
pub mod debug_invariants;
pub mod hspline_error;
pub mod mesh;
pub mod mlmatrix;
pub mod space;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::bspline::{KnotVector, make_knots, prolongation};
    pub use crate::cache::InvalidateCache;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::hspline_error::HSplineError;
    pub use crate::mesh::hierarchical::HMesh;
    pub use crate::mesh::multi_index::{IndexSet, LevelSets, MultiIndex};
    pub use crate::mesh::tensor::TensorMesh;
    pub use crate::mlmatrix::MlBandedMatrix;
    pub use crate::space::{BoundarySpec, Classification, HSpace, HSpaceOptions, IndexStrategy, Side};
}
