//! Re-export public algorithms.

pub mod sparse;

pub use sparse::{kron, multi_kron};
