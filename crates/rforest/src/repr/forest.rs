//! Canonical forest representation (collection of trees).

use super::tree::{Tree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("forest has no trees")]
    EmptyForest,
    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Label values (and optional weights) gathered from the leaves one sample
/// reaches across the forest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafDistribution {
    pub values: Vec<f32>,
    /// Same length as `values` when present.
    pub weights: Option<Vec<f32>>,
}

/// Bagged regression forest.
///
/// The prediction for a sample is the uniform mean of the tree outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Highest split feature index across all trees.
    pub fn max_split_index(&self) -> Option<u32> {
        self.trees.iter().filter_map(Tree::max_split_index).max()
    }

    /// Whether any tree recorded per-sample weights at its leaves.
    pub fn has_weighted_samples(&self) -> bool {
        self.trees.iter().any(|t| t.leaf_samples().is_weighted())
    }

    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.trees.is_empty() {
            return Err(ForestValidationError::EmptyForest);
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }

    /// Mean of the tree outputs for one row.
    ///
    /// Returns NaN for an empty forest. `features` must cover every split
    /// index; see [`Forest::max_split_index`].
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let sum: f32 = self.trees.iter().map(|t| t.predict_row(features)).sum();
        sum / self.trees.len() as f32
    }

    /// Gather up to `sample_count` recorded labels from the leaf each tree
    /// routes `features` to.
    ///
    /// Weights are reported when any tree recorded them; labels from trees
    /// without weights count as 1.0.
    pub fn leaf_distribution(&self, features: &[f32], sample_count: usize) -> LeafDistribution {
        let weighted = self.has_weighted_samples();
        let mut dist = LeafDistribution {
            values: Vec::with_capacity(self.trees.len() * sample_count),
            weights: weighted.then(|| Vec::with_capacity(self.trees.len() * sample_count)),
        };

        for tree in &self.trees {
            let leaf = tree.traverse_to_leaf(features);
            let (values, weights) = tree.leaf_samples().get(leaf);
            let n = values.len().min(sample_count);
            dist.values.extend_from_slice(&values[..n]);
            if let Some(out) = dist.weights.as_mut() {
                match weights {
                    Some(w) => out.extend_from_slice(&w[..n]),
                    None => out.extend(std::iter::repeat(1.0).take(n)),
                }
            }
        }

        dist
    }
}
