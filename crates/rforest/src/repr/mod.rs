//! Forest and tree representations shared by training, inference and persistence.

/// Node identifier: an index into a tree's SoA arrays.
pub type NodeId = u32;

mod forest;
mod leaf;
mod tree;

pub use forest::{Forest, ForestValidationError, LeafDistribution};
pub use leaf::{LeafSamples, LeafSamplesBuilder};
pub use tree::{MutableTree, Tree, TreeValidationError};
