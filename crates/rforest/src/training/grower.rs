//! Exact greedy, leaf-wise regression tree growth.
//!
//! The grower fits one tree to a gradient vector over a subset of rows and
//! features. At each step it splits the open leaf with the largest variance
//! reduction, until `max_leaves` is reached or no leaf has a valid split.
//!
//! Split gain for a candidate partition is
//! `G_L² / W_L + G_R² / W_R - G² / W`, where `G` is the weighted gradient sum
//! and `W` the weight sum of a node. Leaf values are the weighted mean
//! gradient of their rows.
//!
//! Missing values (NaN) always go to the left child, so every split is
//! stored with `default_left = true`.

use ndarray::ArrayView2;

use crate::repr::{MutableTree, NodeId, Tree};
use crate::utils::Parallelism;

/// Relative gain below which a split is considered noise.
const MIN_GAIN_RATIO: f64 = 1e-10;

/// Tree growth limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowerParams {
    /// Maximum number of leaves per tree.
    pub max_leaves: usize,
    /// Minimum number of rows in each child of a split.
    pub min_samples_leaf: usize,
}

impl Default for GrowerParams {
    fn default() -> Self {
        Self {
            max_leaves: 20,
            min_samples_leaf: 10,
        }
    }
}

/// A grown tree together with the rows that reached each leaf.
#[derive(Debug, Clone)]
pub struct GrownTree {
    pub tree: Tree,
    /// `(leaf id, row indices)` for every leaf.
    pub leaves: Vec<(NodeId, Vec<u32>)>,
}

#[derive(Debug, Clone, Copy)]
struct SplitInfo {
    feature: u32,
    threshold: f32,
    gain: f64,
}

#[derive(Debug)]
struct OpenLeaf {
    node: NodeId,
    rows: Vec<u32>,
    sum_w: f64,
    sum_wg: f64,
    split: Option<SplitInfo>,
}

/// Leaf-wise tree grower.
#[derive(Debug, Clone)]
pub struct TreeGrower {
    params: GrowerParams,
    parallelism: Parallelism,
}

impl TreeGrower {
    pub fn new(params: GrowerParams, parallelism: Parallelism) -> Self {
        Self {
            params: GrowerParams {
                max_leaves: params.max_leaves.max(1),
                min_samples_leaf: params.min_samples_leaf.max(1),
            },
            parallelism,
        }
    }

    pub fn params(&self) -> &GrowerParams {
        &self.params
    }

    /// Grow one tree.
    ///
    /// - `features`: sample-major `[n_rows, n_features]`
    /// - `gradient`: one entry per row of `features`
    /// - `weights`: optional per-row weights (uniform when `None`)
    /// - `rows`: in-bag rows, without duplicates
    /// - `feature_subset`: candidate split features
    pub fn grow<'a>(
        &self,
        features: ArrayView2<'a, f32>,
        gradient: &'a [f32],
        weights: Option<&'a [f32]>,
        rows: Vec<u32>,
        feature_subset: &[u32],
    ) -> GrownTree {
        debug_assert_eq!(features.nrows(), gradient.len());

        let ctx = SplitContext {
            features,
            gradient,
            weights,
            min_samples_leaf: self.params.min_samples_leaf,
        };

        let mut tree = MutableTree::new();
        let root = tree.init_root();
        let mut open = vec![self.open_leaf(&ctx, root, rows, feature_subset)];
        let mut n_leaves = 1;

        while n_leaves < self.params.max_leaves {
            let best = open
                .iter()
                .enumerate()
                .filter_map(|(i, leaf)| leaf.split.map(|s| (i, s.gain)))
                .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
            let Some((idx, _)) = best else { break };

            let leaf = open.swap_remove(idx);
            let Some(split) = leaf.split else { break };
            let (left, right) = tree.apply_numeric_split(leaf.node, split.feature, split.threshold, true);

            let column = features.column(split.feature as usize);
            let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = leaf.rows.iter().partition(|&&r| {
                let v = column[r as usize];
                v.is_nan() || v < split.threshold
            });

            open.push(self.open_leaf(&ctx, left, left_rows, feature_subset));
            open.push(self.open_leaf(&ctx, right, right_rows, feature_subset));
            n_leaves += 1;
        }

        open.sort_by_key(|leaf| leaf.node);
        let leaves = open
            .into_iter()
            .map(|leaf| {
                let value = if leaf.sum_w > 0.0 { leaf.sum_wg / leaf.sum_w } else { 0.0 };
                tree.make_leaf(leaf.node, value as f32);
                (leaf.node, leaf.rows)
            })
            .collect();

        GrownTree {
            tree: tree.freeze(),
            leaves,
        }
    }

    fn open_leaf(&self, ctx: &SplitContext<'_>, node: NodeId, rows: Vec<u32>, feature_subset: &[u32]) -> OpenLeaf {
        let (sum_w, sum_wg) = rows.iter().fold((0.0f64, 0.0f64), |(sw, swg), &r| {
            let (w, g) = ctx.row_stats(r);
            (sw + w, swg + w * g)
        });

        let split = if rows.len() >= 2 * ctx.min_samples_leaf && sum_w > 0.0 {
            let parent = sum_wg * sum_wg / sum_w;
            let candidates = self
                .parallelism
                .maybe_par_map(feature_subset.to_vec(), |f| ctx.best_split_for_feature(&rows, f, parent));
            candidates
                .into_iter()
                .flatten()
                .fold(None, |best: Option<SplitInfo>, c| match best {
                    Some(b) if b.gain >= c.gain => Some(b),
                    _ => Some(c),
                })
                .filter(|s| s.gain > MIN_GAIN_RATIO * parent.abs().max(1.0))
        } else {
            None
        };

        OpenLeaf {
            node,
            rows,
            sum_w,
            sum_wg,
            split,
        }
    }
}

struct SplitContext<'a> {
    features: ArrayView2<'a, f32>,
    gradient: &'a [f32],
    weights: Option<&'a [f32]>,
    min_samples_leaf: usize,
}

impl SplitContext<'_> {
    #[inline]
    fn row_stats(&self, row: u32) -> (f64, f64) {
        let r = row as usize;
        let w = self.weights.map_or(1.0, |w| w[r] as f64);
        (w, self.gradient[r] as f64)
    }

    /// Best threshold on one feature, scanning sorted values once.
    fn best_split_for_feature(&self, rows: &[u32], feature: u32, parent: f64) -> Option<SplitInfo> {
        let column = self.features.column(feature as usize);

        let mut missing = (0usize, 0.0f64, 0.0f64);
        let mut present: Vec<(f32, f64, f64)> = Vec::with_capacity(rows.len());
        for &r in rows {
            let v = column[r as usize];
            let (w, g) = self.row_stats(r);
            if v.is_nan() {
                missing = (missing.0 + 1, missing.1 + w, missing.2 + w * g);
            } else {
                present.push((v, w, w * g));
            }
        }
        if present.len() < 2 {
            return None;
        }
        present.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total_w = missing.1 + present.iter().map(|p| p.1).sum::<f64>();
        let total_wg = missing.2 + present.iter().map(|p| p.2).sum::<f64>();

        let (mut left_n, mut left_w, mut left_wg) = missing;
        let mut best: Option<SplitInfo> = None;

        for i in 0..present.len() - 1 {
            let (v, w, wg) = present[i];
            left_n += 1;
            left_w += w;
            left_wg += wg;

            let next = present[i + 1].0;
            if v == next {
                continue;
            }
            let right_n = rows.len() - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                continue;
            }
            let right_w = total_w - left_w;
            let right_wg = total_wg - left_wg;
            if left_w <= 0.0 || right_w <= 0.0 {
                continue;
            }

            let gain = left_wg * left_wg / left_w + right_wg * right_wg / right_w - parent;
            if best.map_or(true, |b| gain > b.gain) {
                let mid = v + (next - v) / 2.0;
                let threshold = if mid <= v { next } else { mid };
                best = Some(SplitInfo {
                    feature,
                    threshold,
                    gain,
                });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn all_rows(n: usize) -> Vec<u32> {
        (0..n as u32).collect()
    }

    #[test]
    fn splits_on_the_informative_feature() {
        let features = array![[0.0f32, 5.0], [1.0, 5.0], [0.0, 6.0], [1.0, 6.0]];
        let gradient = [1.0, 2.0, 1.0, 3.0];
        let grower = TreeGrower::new(
            GrowerParams {
                max_leaves: 20,
                min_samples_leaf: 1,
            },
            Parallelism::Sequential,
        );

        let grown = grower.grow(features.view(), &gradient, None, all_rows(4), &[0, 1]);
        let tree = &grown.tree;

        assert!(tree.validate().is_ok());
        assert_eq!(tree.split_index(0), 0);
        assert_relative_eq!(tree.split_threshold(0), 0.5);
        assert_eq!(tree.n_leaves(), 3);
        for (row, &g) in features.rows().into_iter().zip(&gradient) {
            assert_eq!(tree.predict_row(row.as_slice().unwrap()), g);
        }

        let covered: usize = grown.leaves.iter().map(|(_, rows)| rows.len()).sum();
        assert_eq!(covered, 4);
    }

    #[test]
    fn max_leaves_bounds_growth() {
        let features = array![[0.0f32], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let gradient = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let grower = TreeGrower::new(
            GrowerParams {
                max_leaves: 2,
                min_samples_leaf: 1,
            },
            Parallelism::Sequential,
        );
        let grown = grower.grow(features.view(), &gradient, None, all_rows(6), &[0]);
        assert_eq!(grown.tree.n_leaves(), 2);
        assert_eq!(grown.leaves.len(), 2);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let features = array![[0.0f32], [1.0], [2.0], [3.0]];
        let gradient = [10.0, 0.0, 0.0, 0.0];
        let grower = TreeGrower::new(
            GrowerParams {
                max_leaves: 10,
                min_samples_leaf: 2,
            },
            Parallelism::Sequential,
        );
        let grown = grower.grow(features.view(), &gradient, None, all_rows(4), &[0]);
        assert!(grown.leaves.iter().all(|(_, rows)| rows.len() >= 2));
    }

    #[test]
    fn constant_gradient_gives_single_leaf() {
        let features = array![[0.0f32], [1.0], [2.0]];
        let grower = TreeGrower::new(GrowerParams { max_leaves: 8, min_samples_leaf: 1 }, Parallelism::Sequential);
        let grown = grower.grow(features.view(), &[4.0, 4.0, 4.0], None, all_rows(3), &[0]);
        assert_eq!(grown.tree.n_nodes(), 1);
        assert_eq!(grown.tree.leaf_value(0), 4.0);
    }

    #[test]
    fn missing_values_go_left() {
        let features = array![[f32::NAN], [0.0], [1.0], [1.0]];
        let gradient = [0.0, 0.0, 5.0, 5.0];
        let grower = TreeGrower::new(GrowerParams { max_leaves: 2, min_samples_leaf: 1 }, Parallelism::Sequential);
        let grown = grower.grow(features.view(), &gradient, None, all_rows(4), &[0]);
        let tree = &grown.tree;
        assert!(tree.default_left(0));
        assert_eq!(tree.predict_row(&[f32::NAN]), 0.0);
        assert_eq!(tree.predict_row(&[1.0]), 5.0);
    }

    #[test]
    fn weighted_leaf_value() {
        let features = array![[0.0f32], [0.0]];
        let grower = TreeGrower::new(GrowerParams { max_leaves: 4, min_samples_leaf: 1 }, Parallelism::Sequential);
        let grown = grower.grow(features.view(), &[1.0, 4.0], Some(&[3.0, 1.0]), all_rows(2), &[0]);
        assert_relative_eq!(grown.tree.leaf_value(0), 1.75);
    }

    #[test]
    fn inputs_from_independent_buffers() {
        let features = array![[0.0f32], [1.0], [2.0], [3.0]];
        let grower = TreeGrower::new(GrowerParams { max_leaves: 2, min_samples_leaf: 1 }, Parallelism::Sequential);

        let grown = {
            let gradient: Vec<f32> = vec![0.0, 0.0, 6.0, 6.0];
            let weights: Vec<f32> = vec![1.0, 1.0, 3.0, 1.0];
            grower.grow(features.view(), &gradient, Some(&weights), all_rows(4), &[0])
        };

        assert_eq!(grown.tree.n_leaves(), 2);
        assert_eq!(grown.tree.predict_row(&[0.5]), 0.0);
        assert_relative_eq!(grown.tree.predict_row(&[2.5]), 6.0);
    }

    #[test]
    fn parallel_matches_sequential() {
        let features = crate::testing::random_features(200, 5, 3, -1.0, 1.0);
        let gradient = crate::testing::synthetic_regression_targets(&features, 4, 0.1);
        let params = GrowerParams { max_leaves: 16, min_samples_leaf: 3 };

        let seq = TreeGrower::new(params, Parallelism::Sequential)
            .grow(features.view(), &gradient, None, all_rows(200), &[0, 1, 2, 3, 4]);
        let par = TreeGrower::new(params, Parallelism::Parallel)
            .grow(features.view(), &gradient, None, all_rows(200), &[0, 1, 2, 3, 4]);
        assert_eq!(seq.tree, par.tree);
    }
}
