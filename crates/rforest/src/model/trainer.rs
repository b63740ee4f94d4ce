//! High-level regression forest trainer.

use crate::data::{RoleMappedData, SchemaError};
use crate::inference::ForestRegressionPredictor;
use crate::repr::Forest;
use crate::training::{DirectLabels, ForestTrainer, RegressionObjective, ShuffledLabels};
use crate::utils::run_with_threads;

use super::config::{ConfigError, ForestRegressionConfig};

/// Errors from training or from packaging a trained model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainError {
    /// A predictor was requested before training completed.
    #[error("no trained forest: call train() first")]
    NotTrained,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Trains a regression forest from a role-mapped dataset.
///
/// # Example
///
/// ```
/// use rforest::data::{RoleMappedData, RoleMapping};
/// use rforest::model::{ForestRegressionConfig, ForestRegressionTrainer};
///
/// let data = rforest::testing::synthetic_regression_dataset(200, 3, 1, 0.1);
/// let roles = RoleMapping::default();
/// let config = ForestRegressionConfig::builder().n_trees(5).build().unwrap();
///
/// let predictor = ForestRegressionTrainer::fit(config, &RoleMappedData::new(&data, &roles)).unwrap();
/// let y = predictor.map(&[0.1, -0.2, 0.3]).unwrap();
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct ForestRegressionTrainer {
    config: ForestRegressionConfig,
    trained: Option<TrainedForest>,
}

#[derive(Debug, Clone)]
struct TrainedForest {
    forest: Forest,
    n_features: usize,
}

impl ForestRegressionTrainer {
    pub fn new(config: ForestRegressionConfig) -> Self {
        Self {
            config,
            trained: None,
        }
    }

    pub fn config(&self) -> &ForestRegressionConfig {
        &self.config
    }

    /// Whether a completed forest is available.
    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    /// Validate roles, build the objective and train the forest.
    ///
    /// A failed call leaves any previously trained forest in place.
    ///
    /// # Errors
    ///
    /// - [`TrainError::Schema`] when a role's column is missing or has the wrong type
    /// - [`TrainError::Config`] when shuffled labels are out of range
    pub fn train(&mut self, data: &RoleMappedData<'_>) -> Result<(), TrainError> {
        let training = data.to_training_data()?;
        let n_features = training.n_features();

        let mut objective: RegressionObjective = if self.config.shuffle_labels {
            ShuffledLabels::new(
                training.labels.clone(),
                training.queries.clone(),
                self.config.shuffle_label_upper_bound,
                self.config.shuffle_seed,
            )?
            .into()
        } else {
            DirectLabels::new(training.labels.clone(), training.queries.clone())?.into()
        };

        let trainer = ForestTrainer::new(self.config.to_forest_params());
        let forest = run_with_threads(self.config.thread_count(), |parallelism| {
            trainer.train(&mut objective, &training, parallelism)
        });

        self.trained = Some(TrainedForest { forest, n_features });
        Ok(())
    }

    /// Package the trained forest into an immutable predictor.
    ///
    /// # Errors
    ///
    /// [`TrainError::NotTrained`] before a successful [`train`](Self::train).
    pub fn create_predictor(&self) -> Result<ForestRegressionPredictor, TrainError> {
        let trained = self.trained.as_ref().ok_or(TrainError::NotTrained)?;
        let predictor = ForestRegressionPredictor::new(
            trained.forest.clone(),
            Some(trained.n_features),
            self.config.inner_args(),
            self.config.quantile_sample_count as usize,
        )?;
        Ok(predictor)
    }

    /// Train and create a predictor in one step.
    pub fn fit(config: ForestRegressionConfig, data: &RoleMappedData<'_>) -> Result<ForestRegressionPredictor, TrainError> {
        let mut trainer = Self::new(config);
        trainer.train(data)?;
        trainer.create_predictor()
    }
}
