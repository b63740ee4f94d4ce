//! Test helpers: a declarative tree macro and synthetic data generators.

use ndarray::Array2;
use rand::prelude::*;

use crate::data::{Column, Dataset};
use crate::repr::{NodeId, Tree};

// =============================================================================
// Tree construction
// =============================================================================

/// Build a [`Tree`] from a node list.
///
/// ```
/// let tree = rforest::scalar_tree! {
///     0 => num(0, 0.5, L) -> 1, 2,
///     1 => leaf(1.0),
///     2 => leaf(2.0),
/// };
/// assert_eq!(tree.predict_row(&[0.3]), 1.0);
/// ```
///
/// `L` / `R` is the default direction for missing values.
#[macro_export]
macro_rules! scalar_tree {
    (@node $spec:ident, $id:literal, num($feat:expr, $thr:expr, L) -> $l:literal, $r:literal) => {
        $spec.split($id, $feat, $thr, true, $l, $r);
    };
    (@node $spec:ident, $id:literal, num($feat:expr, $thr:expr, R) -> $l:literal, $r:literal) => {
        $spec.split($id, $feat, $thr, false, $l, $r);
    };
    (@node $spec:ident, $id:literal, leaf($value:expr)) => {
        $spec.leaf($id, $value);
    };
    ($($id:literal => $kind:ident ( $($args:tt)* ) $(-> $l:literal, $r:literal)?),+ $(,)?) => {{
        let mut spec = $crate::testing::TreeSpec::new();
        $( $crate::scalar_tree!(@node spec, $id, $kind($($args)*) $(-> $l, $r)?); )+
        spec.build()
    }};
}

#[derive(Debug, Clone, Copy)]
enum NodeSpec {
    Split {
        feature: u32,
        threshold: f32,
        default_left: bool,
        left: NodeId,
        right: NodeId,
    },
    Leaf(f32),
}

/// Node-by-node tree description used by [`scalar_tree!`](crate::scalar_tree).
#[derive(Debug, Clone, Default)]
pub struct TreeSpec {
    nodes: Vec<Option<NodeSpec>>,
}

impl TreeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, id: NodeId) -> &mut Option<NodeSpec> {
        let idx = id as usize;
        if self.nodes.len() <= idx {
            self.nodes.resize(idx + 1, None);
        }
        &mut self.nodes[idx]
    }

    pub fn split(
        &mut self,
        id: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
        left: NodeId,
        right: NodeId,
    ) {
        *self.slot(id) = Some(NodeSpec::Split {
            feature,
            threshold,
            default_left,
            left,
            right,
        });
    }

    pub fn leaf(&mut self, id: NodeId, value: f32) {
        *self.slot(id) = Some(NodeSpec::Leaf(value));
    }

    /// Build the tree. Panics if a node id was skipped.
    pub fn build(self) -> Tree {
        let n = self.nodes.len();
        let mut split_indices = Vec::with_capacity(n);
        let mut thresholds = Vec::with_capacity(n);
        let mut lefts = Vec::with_capacity(n);
        let mut rights = Vec::with_capacity(n);
        let mut default_left = Vec::with_capacity(n);
        let mut is_leaf = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);

        for (i, node) in self.nodes.into_iter().enumerate() {
            match node.unwrap_or_else(|| panic!("node {i} not defined")) {
                NodeSpec::Split {
                    feature,
                    threshold,
                    default_left: dl,
                    left,
                    right,
                } => {
                    split_indices.push(feature);
                    thresholds.push(threshold);
                    lefts.push(left);
                    rights.push(right);
                    default_left.push(dl);
                    is_leaf.push(false);
                    values.push(0.0);
                }
                NodeSpec::Leaf(value) => {
                    split_indices.push(0);
                    thresholds.push(0.0);
                    lefts.push(0);
                    rights.push(0);
                    default_left.push(false);
                    is_leaf.push(true);
                    values.push(value);
                }
            }
        }

        Tree::new(split_indices, thresholds, lefts, rights, default_left, is_leaf, values)
    }
}

// =============================================================================
// Synthetic data
// =============================================================================

/// Random dense features `[rows, cols]`, uniform in `[min, max]`.
pub fn random_features(rows: usize, cols: usize, seed: u64, min: f32, max: f32) -> Array2<f32> {
    assert!(max >= min);
    let mut rng = StdRng::seed_from_u64(seed);
    let width = max - min;
    Array2::from_shape_simple_fn((rows, cols), || min + rng.r#gen::<f32>() * width)
}

/// Regression targets from a random linear model of `features` plus uniform noise.
pub fn synthetic_regression_targets(features: &Array2<f32>, seed: u64, noise_amplitude: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let weights: Vec<f32> = (0..features.ncols())
        .map(|_| rng.r#gen::<f32>() * 2.0 - 1.0)
        .collect();
    let bias: f32 = rng.r#gen::<f32>() * 0.5 - 0.25;

    features
        .rows()
        .into_iter()
        .map(|row| {
            let mut y = bias + row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f32>();
            if noise_amplitude > 0.0 {
                y += (rng.r#gen::<f32>() * 2.0 - 1.0) * noise_amplitude;
            }
            y
        })
        .collect()
}

/// Dataset with a `"Label"` float column and a `"Features"` vector column.
pub fn regression_dataset(features: Array2<f32>, labels: Vec<f32>) -> Dataset {
    Dataset::new()
        .with_column("Label", Column::Float(labels))
        .and_then(|d| d.with_column("Features", Column::Vector(features)))
        .expect("labels and features must have the same number of rows")
}

/// Random linear regression problem packaged as a [`Dataset`].
pub fn synthetic_regression_dataset(rows: usize, cols: usize, seed: u64, noise_amplitude: f32) -> Dataset {
    let features = random_features(rows, cols, seed, -1.0, 1.0);
    let labels = synthetic_regression_targets(&features, seed.wrapping_add(1), noise_amplitude);
    regression_dataset(features, labels)
}

/// Integer labels in `[0, n_buckets)`, suitable for label shuffling.
pub fn bucket_labels(rows: usize, n_buckets: u32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows).map(|_| rng.gen_range(0..n_buckets) as f32).collect()
}
