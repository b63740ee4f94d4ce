//! High-level regression forest model API.
//!
//! - [`ForestRegressionConfig`]: validated training configuration
//! - [`ForestRegressionTrainer`]: role validation, objective selection and training
//! - [`ConfigError`], [`TrainError`]: configuration and training errors

mod config;
mod trainer;

pub use config::{ConfigError, ForestRegressionConfig, DEFAULT_SHUFFLE_LABEL_UPPER_BOUND};
pub use trainer::{ForestRegressionTrainer, TrainError};
