//! Training infrastructure for regression forests.
//!
//! - [`RegressionObjective`]: per-round gradient (the label, optionally reshuffled)
//! - [`TreeGrower`]: exact greedy leaf-wise tree growth
//! - [`ForestTrainer`]: bagging loop tying objective and grower together
//! - [`TrainingLogger`], [`Verbosity`]: structured progress logging

mod grower;
mod logger;
mod objectives;
mod trainer;

pub use grower::{GrowerParams, GrownTree, TreeGrower};
pub use logger::{TrainingLogger, Verbosity};
pub use objectives::{DirectLabels, RegressionObjective, ShuffledLabels};
pub use trainer::{ForestParams, ForestTrainer};
