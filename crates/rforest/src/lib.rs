//! rforest: regression random forests with quantile prediction.
//!
//! Bagged regression trees whose prediction is the uniform mean of the tree
//! outputs. Every leaf also keeps a subsample of the original training labels
//! that reached it, so the same forest answers conditional quantile queries.
//!
//! # Key Types
//!
//! - [`ForestRegressionTrainer`] / [`ForestRegressionConfig`] - Training
//! - [`ForestRegressionPredictor`] - Scalar, batch and quantile prediction
//! - [`Dataset`] / [`RoleMapping`] - Input data and column roles
//!
//! # Training
//!
//! Use `ForestRegressionConfig::builder()` to configure, then
//! `ForestRegressionTrainer::fit()`. See the [`model`] module for details.
//!
//! # Persistence
//!
//! Predictors round-trip through a versioned binary format, see [`io`].

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod data;
pub mod inference;
pub mod io;
pub mod model;
pub mod repr;
pub mod stats;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Training and configuration
pub use model::{ConfigError, ForestRegressionConfig, ForestRegressionTrainer, TrainError};

// Prediction
pub use inference::{BoundQuantileMapper, ForestRegressionPredictor, PredictError, QuantileMapper};

// Data types
pub use data::{Column, ColumnRole, ColumnType, Dataset, DatasetSchema, RoleMappedData, RoleMapping, SchemaError};

// Persistence
pub use io::{DeserializeError, SerializeError};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
