//! Canonical tree representation (SoA) and its mutable builder.
//!
//! - [`Tree`]: immutable SoA storage used for prediction and persistence
//! - [`MutableTree`]: growable tree used by the grower, frozen into a [`Tree`]
//! - [`TreeValidationError`]: structural validation errors

use super::leaf::LeafSamples;
use super::NodeId;

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },
    #[error("node {node} reached by more than one path")]
    DuplicateVisit { node: NodeId },
    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("leaf samples cover {len} nodes, tree has {n_nodes}")]
    LeafSamplesLenMismatch { len: usize, n_nodes: usize },
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays regression tree.
///
/// Child indices are local to this tree (0 = root). A numeric split sends a
/// sample left when `value < threshold`, and NaN follows `default_left`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
    leaf_samples: LeafSamples,
}

impl Tree {
    /// Create a tree from parallel arrays, all of length `n_nodes`.
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f32>,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert_eq!(n_nodes, split_thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, default_left.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, leaf_values.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            leaf_samples: LeafSamples::empty(),
        }
    }

    /// Attach the label samples recorded at each leaf (builder pattern).
    pub fn with_leaf_samples(mut self, samples: LeafSamples) -> Self {
        self.leaf_samples = samples;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_values[node as usize]
    }

    #[inline]
    pub fn leaf_samples(&self) -> &LeafSamples {
        &self.leaf_samples
    }

    /// Number of leaf nodes.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    /// Highest feature index used by any split, or `None` for a single-leaf tree.
    pub fn max_split_index(&self) -> Option<u32> {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|(_, &leaf)| !leaf)
            .map(|(&idx, _)| idx)
            .max()
    }

    pub(crate) fn split_indices(&self) -> &[u32] {
        &self.split_indices
    }

    pub(crate) fn split_thresholds(&self) -> &[f32] {
        &self.split_thresholds
    }

    pub(crate) fn left_children(&self) -> &[u32] {
        &self.left_children
    }

    pub(crate) fn right_children(&self) -> &[u32] {
        &self.right_children
    }

    pub(crate) fn default_lefts(&self) -> &[bool] {
        &self.default_left
    }

    pub(crate) fn leaf_flags(&self) -> &[bool] {
        &self.is_leaf
    }

    pub(crate) fn leaf_values(&self) -> &[f32] {
        &self.leaf_values
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Find the leaf reached by `features`.
    ///
    /// `features` must be longer than every split index in the tree; callers
    /// check the input shape once per forest.
    #[inline]
    pub fn traverse_to_leaf(&self, features: &[f32]) -> NodeId {
        let mut node: NodeId = 0;
        while !self.is_leaf(node) {
            let fvalue = features[self.split_index(node) as usize];
            let go_left = if fvalue.is_nan() {
                self.default_left(node)
            } else {
                fvalue < self.split_threshold(node)
            };
            node = if go_left {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }
        node
    }

    /// Leaf value reached by `features`.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate structural invariants: every node reachable exactly once from
    /// the root, children in bounds, and leaf samples indexed by node.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let samples_len = self.leaf_samples.segments().len();
        if samples_len != 0 && samples_len != n_nodes {
            return Err(TreeValidationError::LeafSamplesLenMismatch {
                len: samples_len,
                n_nodes,
            });
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, finished)) = stack.pop() {
            let idx = node as usize;
            if finished {
                color[idx] = 2;
                continue;
            }
            match color[idx] {
                1 => return Err(TreeValidationError::CycleDetected { node }),
                2 => return Err(TreeValidationError::DuplicateVisit { node }),
                _ => {}
            }
            color[idx] = 1;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }
            for (side, child) in [("right", self.right_child(node)), ("left", self.left_child(node))] {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
                stack.push((child, false));
            }
        }

        match color.iter().position(|&c| c == 0) {
            Some(i) => Err(TreeValidationError::UnreachableNode { node: i as NodeId }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// MutableTree
// ============================================================================

/// Growable tree used while training.
///
/// Nodes are appended in creation order, so the root is always node 0 and
/// children always have larger ids than their parent.
#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
}

impl MutableTree {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    fn push_node(&mut self) -> NodeId {
        let id = self.n_nodes() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        self.is_leaf.push(true);
        self.leaf_values.push(0.0);
        id
    }

    /// Reset to a single root leaf and return its id.
    pub fn init_root(&mut self) -> NodeId {
        *self = Self::default();
        self.push_node()
    }

    /// Turn `node` into a numeric split and return its `(left, right)` children.
    pub fn apply_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
    ) -> (NodeId, NodeId) {
        let left = self.push_node();
        let right = self.push_node();
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = threshold;
        self.left_children[idx] = left;
        self.right_children[idx] = right;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
        (left, right)
    }

    /// Mark `node` as a leaf with `value`.
    pub fn make_leaf(&mut self, node: NodeId, value: f32) {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.leaf_values[idx] = value;
    }

    /// Convert into an immutable [`Tree`].
    pub fn freeze(self) -> Tree {
        Tree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        )
    }
}
