//! Quantile regression on top of a trained forest.
//!
//! Every leaf stores a subsample of the original training labels that reached
//! it. A quantile query routes the features through each tree, pools up to
//! `quantile_sample_count` recorded labels per tree (with their weights) and
//! reads the requested quantiles off the pooled sample.

use std::fmt;

use ndarray::Array2;

use crate::data::{vector_row, ColumnRole, ColumnType, Dataset, DatasetSchema, SchemaError};
use crate::model::ConfigError;
use crate::stats::QuantileStatistics;

use super::predictor::{ForestRegressionPredictor, InputShape, PredictError};

/// Boxed quantile function as stored by [`BoundQuantileMapper`].
type QuantileFn<'a> = Box<dyn Fn(&[f32], &mut Vec<f32>) -> Result<(), PredictError> + Send + Sync + 'a>;

/// Reject an empty list and any quantile outside `[0, 1]` (including NaN).
pub fn check_quantiles(quantiles: &[f32]) -> Result<(), ConfigError> {
    if quantiles.is_empty() {
        return Err(ConfigError::EmptyQuantiles);
    }
    for (index, &value) in quantiles.iter().enumerate() {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::QuantileOutOfRange { index, value });
        }
    }
    Ok(())
}

/// Write the requested quantiles into `out`, reusing its allocation when the
/// capacity suffices.
fn write_quantiles(stats: &QuantileStatistics, quantiles: &[f32], out: &mut Vec<f32>) {
    if out.capacity() < quantiles.len() {
        *out = Vec::with_capacity(quantiles.len());
    } else {
        out.clear();
    }
    out.extend(quantiles.iter().map(|&q| stats.quantile(q)));
}

impl ForestRegressionPredictor {
    /// Quantile values for one feature vector.
    ///
    /// `quantiles` must already be validated.
    fn quantile_values(&self, features: &[f32], quantiles: &[f32], out: &mut Vec<f32>) -> Result<(), PredictError> {
        self.check_input(features.len())?;
        let dist = self
            .forest()
            .leaf_distribution(features, self.quantile_sample_count());
        let stats = QuantileStatistics::new(&dist.values, dist.weights.as_deref());
        write_quantiles(&stats, quantiles, out);
        Ok(())
    }

    fn quantile_fn(&self, quantiles: Vec<f32>) -> QuantileFn<'_> {
        Box::new(move |features, out| self.quantile_values(features, &quantiles, out))
    }

    /// Function mapping a feature vector to the values at `quantiles`.
    ///
    /// The function writes exactly `quantiles.len()` values into its output
    /// buffer, in the order the quantiles were given. The buffer is reused
    /// when its capacity suffices.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyQuantiles`] or [`ConfigError::QuantileOutOfRange`].
    /// The returned function fails with [`PredictError::FeatureCountMismatch`]
    /// for a feature vector of the wrong length.
    ///
    /// # Example
    ///
    /// ```
    /// use rforest::data::{RoleMappedData, RoleMapping};
    /// use rforest::model::{ForestRegressionConfig, ForestRegressionTrainer};
    ///
    /// let data = rforest::testing::synthetic_regression_dataset(200, 2, 7, 0.2);
    /// let config = ForestRegressionConfig::builder().n_trees(10).build().unwrap();
    /// let predictor =
    ///     ForestRegressionTrainer::fit(config, &RoleMappedData::new(&data, &RoleMapping::default())).unwrap();
    ///
    /// let mapper = predictor.get_mapper(&[0.1, 0.5, 0.9]).unwrap();
    /// let mut out = Vec::new();
    /// mapper(&[0.0, 0.5], &mut out).unwrap();
    /// assert_eq!(out.len(), 3);
    /// assert!(out[0] <= out[1] && out[1] <= out[2]);
    /// ```
    pub fn get_mapper(
        &self,
        quantiles: &[f32],
    ) -> Result<impl Fn(&[f32], &mut Vec<f32>) -> Result<(), PredictError> + Send + Sync + '_, ConfigError> {
        check_quantiles(quantiles)?;
        let quantiles = quantiles.to_vec();
        Ok(move |features: &[f32], out: &mut Vec<f32>| self.quantile_values(features, &quantiles, out))
    }

    /// Validated quantile mapper that can be bound to a dataset schema.
    pub fn create_mapper(&self, quantiles: &[f32]) -> Result<QuantileMapper<'_>, ConfigError> {
        check_quantiles(quantiles)?;
        Ok(QuantileMapper {
            predictor: self,
            quantiles: quantiles.to_vec(),
        })
    }
}

// =============================================================================
// QuantileMapper
// =============================================================================

/// Quantile list validated against a predictor, not yet bound to a schema.
#[derive(Clone)]
pub struct QuantileMapper<'a> {
    predictor: &'a ForestRegressionPredictor,
    quantiles: Vec<f32>,
}

impl fmt::Debug for QuantileMapper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantileMapper")
            .field("quantiles", &self.quantiles)
            .finish_non_exhaustive()
    }
}

impl<'a> QuantileMapper<'a> {
    #[inline]
    pub fn quantiles(&self) -> &[f32] {
        &self.quantiles
    }

    /// Quantile values for one feature vector.
    pub fn map(&self, features: &[f32], out: &mut Vec<f32>) -> Result<(), PredictError> {
        self.predictor.quantile_values(features, &self.quantiles, out)
    }

    /// Resolve the feature column in `schema` and check its dimension.
    ///
    /// A fixed-size vector column must fit the predictor's input shape. A
    /// variable-size column is accepted and checked row by row.
    pub fn bind(&self, schema: &DatasetSchema, features_column: &str) -> Result<BoundQuantileMapper<'a>, SchemaError> {
        let meta = schema.find(features_column).ok_or_else(|| SchemaError::MissingColumn {
            role: ColumnRole::Features,
            name: features_column.to_string(),
        })?;

        match meta.column_type {
            ColumnType::Vector { dim: Some(dim) } => {
                let shape = self.predictor.input_shape();
                if !shape.accepts(dim) {
                    let expected = match shape {
                        InputShape::Exact(n) | InputShape::AtLeast(n) => n,
                    };
                    return Err(SchemaError::FeatureDimensionMismatch {
                        name: features_column.to_string(),
                        expected,
                        got: dim,
                    });
                }
            }
            ColumnType::Vector { dim: None } => {}
            got => {
                return Err(SchemaError::InvalidColumnType {
                    role: ColumnRole::Features,
                    name: features_column.to_string(),
                    expected: "vector<float>",
                    got,
                })
            }
        }

        Ok(BoundQuantileMapper {
            column: features_column.to_string(),
            n_quantiles: self.quantiles.len(),
            mapper: self.predictor.quantile_fn(self.quantiles.clone()),
        })
    }
}

// =============================================================================
// BoundQuantileMapper
// =============================================================================

/// Quantile mapper bound to a named feature column.
pub struct BoundQuantileMapper<'a> {
    column: String,
    n_quantiles: usize,
    mapper: QuantileFn<'a>,
}

impl fmt::Debug for BoundQuantileMapper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundQuantileMapper")
            .field("column", &self.column)
            .field("n_quantiles", &self.n_quantiles)
            .finish_non_exhaustive()
    }
}

impl BoundQuantileMapper<'_> {
    #[inline]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[inline]
    pub fn n_quantiles(&self) -> usize {
        self.n_quantiles
    }

    /// Quantile values for one feature vector.
    #[inline]
    pub fn map_row(&self, features: &[f32], out: &mut Vec<f32>) -> Result<(), PredictError> {
        (self.mapper)(features, out)
    }

    /// Quantile values for every row of `data`, shape `[n_rows, n_quantiles]`.
    pub fn map_dataset(&self, data: &Dataset) -> Result<Array2<f32>, PredictError> {
        let column = data.column(&self.column).ok_or_else(|| SchemaError::MissingColumn {
            role: ColumnRole::Features,
            name: self.column.clone(),
        })?;

        let n_rows = column.n_rows();
        let mut result = Array2::zeros((n_rows, self.n_quantiles));
        let mut buf = Vec::with_capacity(self.n_quantiles);
        for (i, mut out_row) in result.rows_mut().into_iter().enumerate() {
            let row = vector_row(column, i).ok_or_else(|| SchemaError::InvalidColumnType {
                role: ColumnRole::Features,
                name: self.column.clone(),
                expected: "vector<float>",
                got: column.column_type(),
            })?;
            row.with_slice(|features| self.map_row(features, &mut buf))?;
            for (dst, &src) in out_row.iter_mut().zip(&buf) {
                *dst = src;
            }
        }
        Ok(result)
    }
}
