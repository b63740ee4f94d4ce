//! Bagged forest training loop.
//!
//! Each round refreshes the objective's labels, computes the gradient, draws
//! an in-bag row subset and a feature subset, grows one tree and records the
//! original labels of the in-bag rows at every leaf.

use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::TrainingData;
use crate::repr::{Forest, LeafSamples, Tree};
use crate::training::grower::{GrowerParams, GrownTree, TreeGrower};
use crate::training::logger::{TrainingLogger, Verbosity};
use crate::training::objectives::RegressionObjective;
use crate::utils::Parallelism;

// =============================================================================
// ForestParams
// =============================================================================

/// Parameters for forest training.
#[derive(Clone, Debug)]
pub struct ForestParams {
    /// Number of trees (rounds).
    pub n_trees: u32,
    /// Per-tree growth limits.
    pub grower: GrowerParams,
    /// Fraction of rows drawn without replacement for each tree.
    pub bagging_fraction: f32,
    /// Fraction of features considered by each tree.
    pub feature_fraction: f32,
    /// Maximum number of labels recorded per leaf.
    pub quantile_sample_count: usize,
    /// Seed for row/feature sampling and leaf label subsampling.
    pub seed: u64,
    pub verbosity: Verbosity,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            grower: GrowerParams::default(),
            bagging_fraction: 0.7,
            feature_fraction: 0.7,
            quantile_sample_count: 100,
            seed: 42,
            verbosity: Verbosity::default(),
        }
    }
}

/// Number of items to draw for `fraction` of `n`, at least one when `n > 0`.
fn sample_size(n: usize, fraction: f32) -> usize {
    if fraction >= 1.0 {
        n
    } else {
        ((n as f64 * fraction as f64).ceil() as usize).clamp(n.min(1), n)
    }
}

// =============================================================================
// ForestTrainer
// =============================================================================

/// Drives the objective and the tree grower for a fixed number of rounds.
#[derive(Clone, Debug)]
pub struct ForestTrainer {
    params: ForestParams,
}

impl ForestTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Train a forest.
    ///
    /// `objective` must have been built from `data`'s labels and query
    /// boundaries. Leaf samples always record `data.labels`, never the
    /// shuffled labels the trees were grown against.
    pub fn train(&self, objective: &mut RegressionObjective, data: &TrainingData, parallelism: Parallelism) -> Forest {
        let n_rows = data.n_rows();
        let n_features = data.n_features();
        debug_assert_eq!(objective.queries().n_examples(), n_rows);

        let mut logger = TrainingLogger::new(self.params.verbosity);
        logger.start_training(self.params.n_trees as usize, n_rows, n_features, objective.name());

        if let Some((&first, rest)) = data.labels.split_first() {
            if rest.iter().all(|&l| l == first) {
                logger.warn("all labels are equal, every tree will be a single leaf");
            }
        }

        let grower = TreeGrower::new(self.params.grower, parallelism);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.params.seed);
        let mut gradient = vec![0.0f32; n_rows];
        let n_bag = sample_size(n_rows, self.params.bagging_fraction);
        let n_feat = sample_size(n_features, self.params.feature_fraction);

        let mut forest = Forest::new();
        for round in 0..self.params.n_trees as usize {
            objective.refresh_labels();
            objective.compute_gradients(&mut gradient, parallelism);

            let rows = self.sample_rows(&mut rng, n_rows, n_bag);
            let feature_subset = sample_features(&mut rng, n_features, n_feat);

            let grown = grower.grow(
                data.features.view(),
                &gradient,
                data.weights.as_deref(),
                rows,
                &feature_subset,
            );
            if grown.tree.n_leaves() == 1 && n_bag > 1 {
                logger.warn("tree has a single leaf, no split improved the fit");
            }
            logger.log_tree(round, grown.tree.n_leaves(), n_bag);

            forest.push_tree(self.attach_leaf_samples(grown, data, &mut rng));
        }

        logger.finish_training(forest.n_trees());
        forest
    }

    fn sample_rows(&self, rng: &mut Xoshiro256PlusPlus, n_rows: usize, n_bag: usize) -> Vec<u32> {
        if n_bag >= n_rows {
            return (0..n_rows as u32).collect();
        }
        let mut rows: Vec<u32> = index::sample(rng, n_rows, n_bag)
            .into_iter()
            .map(|i| i as u32)
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Record up to `quantile_sample_count` original labels at every leaf.
    fn attach_leaf_samples(&self, grown: GrownTree, data: &TrainingData, rng: &mut Xoshiro256PlusPlus) -> Tree {
        let GrownTree { tree, leaves } = grown;
        let limit = self.params.quantile_sample_count;
        let weights = data.weights.as_deref();
        let mut samples = LeafSamples::builder(tree.n_nodes(), weights.is_some());

        let mut values = Vec::with_capacity(limit);
        let mut sample_weights = Vec::with_capacity(limit);
        for (node, rows) in leaves {
            let chosen: Vec<u32> = if rows.len() > limit {
                rows.choose_multiple(rng, limit).copied().collect()
            } else {
                rows
            };

            values.clear();
            values.extend(chosen.iter().map(|&r| data.labels[r as usize]));
            match weights {
                Some(w) => {
                    sample_weights.clear();
                    sample_weights.extend(chosen.iter().map(|&r| w[r as usize]));
                    samples.set(node, &values, Some(sample_weights.as_slice()));
                }
                None => samples.set(node, &values, None),
            }
        }

        tree.with_leaf_samples(samples.build())
    }
}

fn sample_features(rng: &mut Xoshiro256PlusPlus, n_features: usize, n_feat: usize) -> Vec<u32> {
    if n_feat >= n_features {
        return (0..n_features as u32).collect();
    }
    let mut features: Vec<u32> = index::sample(rng, n_features, n_feat)
        .into_iter()
        .map(|i| i as u32)
        .collect();
    features.sort_unstable();
    features
}
