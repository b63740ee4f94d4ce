//! Trained regression forest predictor.

use std::fmt;

use ndarray::{Array1, ArrayView2};

use crate::data::SchemaError;
use crate::model::ConfigError;
use crate::repr::Forest;
use crate::utils::run_with_threads;

/// Feature vector length a predictor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// The training feature dimension is known: lengths must match exactly.
    Exact(usize),
    /// Unknown dimension: the vector must cover every split feature index.
    AtLeast(usize),
}

impl InputShape {
    #[inline]
    pub fn accepts(self, len: usize) -> bool {
        match self {
            Self::Exact(n) => len == n,
            Self::AtLeast(n) => len >= n,
        }
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Errors at prediction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictError {
    #[error("expected {expected} features, got {got}")]
    FeatureCountMismatch { expected: InputShape, got: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Immutable regression forest predictor.
///
/// Holds the trained forest, the training feature dimension (when known), the
/// configuration string the forest was trained with, and the number of leaf
/// labels drawn per tree for quantile queries. Nothing changes after
/// construction, so a predictor can be shared freely across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestRegressionPredictor {
    forest: Forest,
    n_features: Option<usize>,
    inner_args: String,
    quantile_sample_count: usize,
    shape: InputShape,
}

impl ForestRegressionPredictor {
    /// # Errors
    ///
    /// - [`ConfigError::EmptyEnsemble`] for a forest without trees
    /// - [`ConfigError::InvalidQuantileSampleCount`] for a zero sample count
    /// - [`ConfigError::InvalidParameter`] when `n_features` does not cover
    ///   the split features of the forest
    pub fn new(
        forest: Forest,
        n_features: Option<usize>,
        inner_args: String,
        quantile_sample_count: usize,
    ) -> Result<Self, ConfigError> {
        if forest.is_empty() {
            return Err(ConfigError::EmptyEnsemble);
        }
        if quantile_sample_count == 0 {
            return Err(ConfigError::InvalidQuantileSampleCount(0));
        }

        let min_len = forest.max_split_index().map_or(0, |i| i as usize + 1);
        let shape = match n_features {
            Some(n) if n < min_len => {
                return Err(ConfigError::InvalidParameter {
                    field: "n_features",
                    constraint: "greater than every split feature index",
                    value: n.to_string(),
                })
            }
            Some(n) => InputShape::Exact(n),
            None => InputShape::AtLeast(min_len),
        };

        Ok(Self {
            forest,
            n_features,
            inner_args,
            quantile_sample_count,
            shape,
        })
    }

    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Training feature dimension, if known.
    #[inline]
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Configuration string of the training run.
    #[inline]
    pub fn inner_args(&self) -> &str {
        &self.inner_args
    }

    #[inline]
    pub fn quantile_sample_count(&self) -> usize {
        self.quantile_sample_count
    }

    #[inline]
    pub fn input_shape(&self) -> InputShape {
        self.shape
    }

    #[inline]
    pub(crate) fn check_input(&self, len: usize) -> Result<(), PredictError> {
        if self.shape.accepts(len) {
            Ok(())
        } else {
            Err(PredictError::FeatureCountMismatch {
                expected: self.shape,
                got: len,
            })
        }
    }

    /// Mean of the tree outputs for one feature vector.
    ///
    /// # Errors
    ///
    /// [`PredictError::FeatureCountMismatch`] when `features` has the wrong
    /// length. No tree is evaluated in that case.
    pub fn map(&self, features: &[f32]) -> Result<f32, PredictError> {
        self.check_input(features.len())?;
        Ok(self.forest.predict_row(features))
    }

    /// Scalar prediction for every row of `features` (`[n_rows, n_features]`).
    ///
    /// `n_threads`: 0 = global pool, 1 = sequential, n = dedicated pool.
    pub fn predict(&self, features: ArrayView2<'_, f32>, n_threads: usize) -> Result<Array1<f32>, PredictError> {
        self.check_input(features.ncols())?;

        let out = run_with_threads(n_threads, |parallelism| {
            parallelism.maybe_par_map(0..features.nrows(), |i| {
                let row = features.row(i);
                match row.as_slice() {
                    Some(slice) => self.forest.predict_row(slice),
                    None => self.forest.predict_row(&row.to_vec()),
                }
            })
        });
        Ok(Array1::from_vec(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, ShapeBuilder};

    fn forest() -> Forest {
        let mut forest = Forest::new();
        forest.push_tree(crate::scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => leaf(1.0),
            2 => leaf(3.0),
        });
        forest.push_tree(crate::scalar_tree! {
            0 => num(2, 0.0, R) -> 1, 2,
            1 => leaf(-1.0),
            2 => leaf(1.0),
        });
        forest
    }

    #[test]
    fn map_averages_trees() {
        let predictor = ForestRegressionPredictor::new(forest(), Some(3), String::new(), 10).unwrap();
        assert_relative_eq!(predictor.map(&[0.0, 9.0, -1.0]).unwrap(), 0.0);
        assert_relative_eq!(predictor.map(&[1.0, 9.0, 1.0]).unwrap(), 2.0);
    }

    #[test]
    fn exact_shape_when_dimension_known() {
        let predictor = ForestRegressionPredictor::new(forest(), Some(4), String::new(), 10).unwrap();
        assert_eq!(predictor.input_shape(), InputShape::Exact(4));
        let err = predictor.map(&[0.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(
            err,
            PredictError::FeatureCountMismatch {
                expected: InputShape::Exact(4),
                got: 3
            }
        );
        assert!(predictor.map(&[0.0; 5]).is_err());
    }

    #[test]
    fn minimum_shape_from_split_indices() {
        let predictor = ForestRegressionPredictor::new(forest(), None, String::new(), 10).unwrap();
        assert_eq!(predictor.input_shape(), InputShape::AtLeast(3));
        assert!(predictor.map(&[0.0, 0.0]).is_err());
        assert!(predictor.map(&[0.0, 0.0, 0.0, 7.0]).is_ok());
    }

    #[test]
    fn construction_is_validated() {
        assert_eq!(
            ForestRegressionPredictor::new(Forest::new(), None, String::new(), 10).unwrap_err(),
            ConfigError::EmptyEnsemble
        );
        assert_eq!(
            ForestRegressionPredictor::new(forest(), None, String::new(), 0).unwrap_err(),
            ConfigError::InvalidQuantileSampleCount(0)
        );
        assert!(matches!(
            ForestRegressionPredictor::new(forest(), Some(2), String::new(), 1),
            Err(ConfigError::InvalidParameter { field: "n_features", .. })
        ));
    }

    #[test]
    fn batch_matches_single_rows() {
        let predictor = ForestRegressionPredictor::new(forest(), Some(3), String::new(), 10).unwrap();
        let features = array![[0.0f32, 0.0, 1.0], [1.0, 0.0, -1.0], [f32::NAN, 0.0, f32::NAN]];

        for n_threads in [1, 2] {
            let batch = predictor.predict(features.view(), n_threads).unwrap();
            for (i, row) in features.rows().into_iter().enumerate() {
                let single = predictor.map(row.as_slice().unwrap()).unwrap();
                assert_eq!(batch[i].to_bits(), single.to_bits());
            }
        }

        // Column-major input takes the copying path.
        let mut fortran = ndarray::Array2::zeros(features.raw_dim().f());
        fortran.assign(&features);
        assert!(fortran.row(0).as_slice().is_none());
        assert_eq!(
            predictor.predict(fortran.view(), 1).unwrap(),
            predictor.predict(features.view(), 1).unwrap()
        );

        assert!(predictor.predict(array![[0.0f32, 1.0]].view(), 1).is_err());
    }
}
