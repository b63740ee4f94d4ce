//! Payload structures for the native storage format.
//!
//! These structs mirror the runtime types in a flat, Postcard-friendly layout.
//! Conversion back to runtime types validates every length and index, so a
//! payload that decodes but is inconsistent never yields a [`Forest`].

use serde::{Deserialize, Serialize};

use crate::repr::{Forest, LeafSamples, Tree};

use super::native::SerializeError;

// ============================================================================
// Forest
// ============================================================================

/// Serialized ensemble plus the predictor metadata that travels with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestPayload {
    /// Training feature dimension, if known.
    pub n_features: Option<u32>,
    /// Configuration string of the training run.
    pub inner_args: String,
    pub trees: Vec<TreePayload>,
}

impl ForestPayload {
    /// # Errors
    ///
    /// [`SerializeError::FeatureCountTooLarge`] when `n_features` does not
    /// fit the 32-bit field.
    pub fn new(forest: &Forest, n_features: Option<usize>, inner_args: &str) -> Result<Self, SerializeError> {
        let n_features = n_features
            .map(|n| u32::try_from(n).map_err(|_| SerializeError::FeatureCountTooLarge(n)))
            .transpose()?;
        Ok(Self {
            n_features,
            inner_args: inner_args.to_string(),
            trees: forest.trees().map(TreePayload::from).collect(),
        })
    }

    /// Rebuild and validate the forest.
    pub fn to_forest(&self) -> Result<Forest, String> {
        let mut forest = Forest::new();
        for (idx, tree) in self.trees.iter().enumerate() {
            let tree = Tree::try_from(tree).map_err(|e| format!("tree {idx}: {e}"))?;
            forest.push_tree(tree);
        }
        forest.validate().map_err(|e| e.to_string())?;
        Ok(forest)
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Single tree in struct-of-arrays layout, with its leaf label samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    pub split_indices: Vec<u32>,
    pub thresholds: Vec<f32>,
    pub left_children: Vec<u32>,
    pub right_children: Vec<u32>,
    pub default_left: Vec<bool>,
    pub is_leaf: Vec<bool>,
    pub leaf_values: Vec<f32>,
    /// `(start, len)` into `sample_values` per node; empty when no samples
    /// were recorded.
    pub sample_segments: Vec<(u32, u32)>,
    pub sample_values: Vec<f32>,
    pub sample_weights: Option<Vec<f32>>,
}

impl From<&Tree> for TreePayload {
    fn from(tree: &Tree) -> Self {
        let samples = tree.leaf_samples();
        Self {
            split_indices: tree.split_indices().to_vec(),
            thresholds: tree.split_thresholds().to_vec(),
            left_children: tree.left_children().to_vec(),
            right_children: tree.right_children().to_vec(),
            default_left: tree.default_lefts().to_vec(),
            is_leaf: tree.leaf_flags().to_vec(),
            leaf_values: tree.leaf_values().to_vec(),
            sample_segments: samples.segments().to_vec(),
            sample_values: samples.values().to_vec(),
            sample_weights: samples.weights().map(<[f32]>::to_vec),
        }
    }
}

impl TryFrom<&TreePayload> for Tree {
    type Error = String;

    fn try_from(payload: &TreePayload) -> Result<Self, Self::Error> {
        let n_nodes = payload.split_indices.len();
        let lengths = [
            ("thresholds", payload.thresholds.len()),
            ("left_children", payload.left_children.len()),
            ("right_children", payload.right_children.len()),
            ("default_left", payload.default_left.len()),
            ("is_leaf", payload.is_leaf.len()),
            ("leaf_values", payload.leaf_values.len()),
        ];
        for (field, len) in lengths {
            if len != n_nodes {
                return Err(format!("{field} has {len} entries for {n_nodes} nodes"));
            }
        }

        let samples = LeafSamples::from_parts(
            payload.sample_segments.clone(),
            payload.sample_values.clone(),
            payload.sample_weights.clone(),
        )
        .ok_or_else(|| "leaf sample segments out of bounds".to_string())?;

        let tree = Tree::new(
            payload.split_indices.clone(),
            payload.thresholds.clone(),
            payload.left_children.clone(),
            payload.right_children.clone(),
            payload.default_left.clone(),
            payload.is_leaf.clone(),
            payload.leaf_values.clone(),
        )
        .with_leaf_samples(samples);
        tree.validate().map_err(|e| e.to_string())?;
        Ok(tree)
    }
}
