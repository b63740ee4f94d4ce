//! Regression forest configuration with builder pattern.
//!
//! [`ForestRegressionConfig`] is built with the `bon` crate and validated at
//! build time.
//!
//! # Example
//!
//! ```
//! use rforest::model::ForestRegressionConfig;
//!
//! // All defaults
//! let config = ForestRegressionConfig::builder().build().unwrap();
//! assert_eq!(config.n_trees, 100);
//!
//! // Shuffled labels, more leaves per tree
//! let config = ForestRegressionConfig::builder()
//!     .shuffle_labels(true)
//!     .max_leaves(64)
//!     .quantile_sample_count(200)
//!     .build()
//!     .unwrap();
//! ```

use std::num::NonZeroUsize;

use bon::Builder;

use crate::training::{ForestParams, GrowerParams, Verbosity};

/// Default exclusive upper bound for shuffled labels.
pub const DEFAULT_SHUFFLE_LABEL_UPPER_BOUND: u32 = 0x7FFF_FFC7;

// =============================================================================
// ConfigError
// =============================================================================

/// Invalid configuration or configuration-dependent input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be {constraint}, got {value}")]
    InvalidParameter {
        field: &'static str,
        constraint: &'static str,
        value: String,
    },

    #[error("quantile_sample_count must be positive, got {0}")]
    InvalidQuantileSampleCount(i64),

    #[error("quantile list is empty")]
    EmptyQuantiles,

    #[error("quantile {index} must be in [0, 1], got {value}")]
    QuantileOutOfRange { index: usize, value: f32 },

    #[error("label of example {index} is {label}, shuffled labels must be integers in [0, {upper_bound})")]
    ShuffleLabelOutOfRange {
        index: usize,
        label: f32,
        upper_bound: u32,
    },

    #[error("{labels} labels for {examples} training examples")]
    LabelCountMismatch { labels: usize, examples: usize },

    #[error("forest has no trees")]
    EmptyEnsemble,
}

impl ConfigError {
    fn invalid(field: &'static str, constraint: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            field,
            constraint,
            value: value.to_string(),
        }
    }
}

// =============================================================================
// ForestRegressionConfig
// =============================================================================

/// Configuration for regression forest training.
///
/// - **Forest**: `n_trees`, `bagging_fraction`, `feature_fraction`
/// - **Tree**: `max_leaves`, `min_samples_leaf`
/// - **Labels**: `shuffle_labels`, `shuffle_label_upper_bound`, `shuffle_seed`
/// - **Quantiles**: `quantile_sample_count`
/// - **Resources**: `n_threads`, `verbosity`
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ForestRegressionConfig {
    // === Forest ===
    /// Number of trees. Default: 100.
    #[builder(default = 100)]
    pub n_trees: u32,

    /// Fraction of rows drawn (without replacement) per tree. Default: 0.7.
    #[builder(default = 0.7)]
    pub bagging_fraction: f32,

    /// Fraction of features considered per tree. Default: 0.7.
    #[builder(default = 0.7)]
    pub feature_fraction: f32,

    // === Tree ===
    /// Maximum leaves per tree. Default: 20.
    #[builder(default = 20)]
    pub max_leaves: u32,

    /// Minimum rows in each child of a split. Default: 10.
    #[builder(default = 10)]
    pub min_samples_leaf: u32,

    // === Labels ===
    /// Remap labels through a random permutation before every tree. Default: false.
    ///
    /// Requires integral labels in `[0, shuffle_label_upper_bound)`.
    #[builder(default = false)]
    pub shuffle_labels: bool,

    /// Exclusive upper bound for shuffled labels.
    #[builder(default = DEFAULT_SHUFFLE_LABEL_UPPER_BOUND)]
    pub shuffle_label_upper_bound: u32,

    /// Seed of the label permutation generator. Default: 0.
    #[builder(default = 0)]
    pub shuffle_seed: u64,

    // === Quantiles ===
    /// Labels recorded per leaf and drawn per tree for quantile queries. Default: 100.
    #[builder(default = 100)]
    pub quantile_sample_count: u32,

    // === Reproducibility ===
    /// Seed for bagging, feature sampling and leaf subsampling. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    // === Resource control ===
    /// Number of threads. `None` uses the global rayon pool.
    pub n_threads: Option<NonZeroUsize>,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

/// Custom finishing function that validates the config.
impl<S: forest_regression_config_builder::IsComplete> ForestRegressionConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is invalid:
    /// - `n_trees == 0`
    /// - `max_leaves < 2` or `min_samples_leaf == 0`
    /// - sampling fractions outside (0, 1]
    /// - `shuffle_label_upper_bound == 0`
    /// - `quantile_sample_count == 0`
    pub fn build(self) -> Result<ForestRegressionConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ForestRegressionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::invalid("n_trees", "at least 1", self.n_trees));
        }
        if self.max_leaves < 2 {
            return Err(ConfigError::invalid("max_leaves", "at least 2", self.max_leaves));
        }
        if self.min_samples_leaf == 0 {
            return Err(ConfigError::invalid("min_samples_leaf", "at least 1", self.min_samples_leaf));
        }
        for (field, value) in [
            ("bagging_fraction", self.bagging_fraction),
            ("feature_fraction", self.feature_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(field, "in (0, 1]", value));
            }
        }
        if self.shuffle_label_upper_bound == 0 {
            return Err(ConfigError::invalid("shuffle_label_upper_bound", "at least 1", 0));
        }
        if self.quantile_sample_count == 0 {
            return Err(ConfigError::InvalidQuantileSampleCount(0));
        }
        Ok(())
    }

    /// Thread count with `0` meaning the global pool.
    pub fn thread_count(&self) -> usize {
        self.n_threads.map_or(0, NonZeroUsize::get)
    }

    /// Model-defining parameters as a stable `key=value` string.
    ///
    /// Resource settings (`n_threads`, `verbosity`) are not included.
    pub fn inner_args(&self) -> String {
        format!(
            "n_trees={} max_leaves={} min_samples_leaf={} bagging_fraction={} feature_fraction={} \
             shuffle_labels={} shuffle_label_upper_bound={} shuffle_seed={} quantile_sample_count={} seed={}",
            self.n_trees,
            self.max_leaves,
            self.min_samples_leaf,
            self.bagging_fraction,
            self.feature_fraction,
            self.shuffle_labels,
            self.shuffle_label_upper_bound,
            self.shuffle_seed,
            self.quantile_sample_count,
            self.seed,
        )
    }

    /// Convert to the training loop parameters.
    pub fn to_forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            grower: GrowerParams {
                max_leaves: self.max_leaves as usize,
                min_samples_leaf: self.min_samples_leaf as usize,
            },
            bagging_fraction: self.bagging_fraction,
            feature_fraction: self.feature_fraction,
            quantile_sample_count: self.quantile_sample_count as usize,
            seed: self.seed,
            verbosity: self.verbosity,
        }
    }
}

impl Default for ForestRegressionConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// Tests
// =============================================================================
