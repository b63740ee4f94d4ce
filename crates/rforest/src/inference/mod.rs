//! Prediction with a trained forest.
//!
//! - [`ForestRegressionPredictor`]: scalar prediction (uniform mean of trees)
//! - [`QuantileMapper`] / [`BoundQuantileMapper`]: conditional quantiles from
//!   the labels recorded at the leaves

mod predictor;
mod quantile;

pub use predictor::{ForestRegressionPredictor, InputShape, PredictError};
pub use quantile::{check_quantiles, BoundQuantileMapper, QuantileMapper};
