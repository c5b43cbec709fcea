//! Tensor product and hierarchical meshes.

pub mod hierarchical;
pub mod multi_index;
pub mod tensor;

pub use hierarchical::{HMesh, Prolongation1d};
pub use multi_index::{IndexSet, LevelSets, MultiIndex};
pub use tensor::TensorMesh;
