//! Datasets, schemas and column roles.
//!
//! - [`Dataset`]: named, equally long [`Column`]s
//! - [`DatasetSchema`]: column names and [`ColumnType`]s
//! - [`RoleMapping`] / [`RoleMappedData`]: which column is the label, the
//!   feature vector, the optional weight and the optional group id
//! - [`TrainingData`]: the dense representation the trainer works on
//! - [`QueryBoundaries`]: contiguous example ranges used to fan out
//!   gradient computation

mod dataset;
mod roles;

pub use dataset::{Column, ColumnMeta, ColumnType, Dataset, DatasetSchema};
pub(crate) use dataset::vector_row;
pub use roles::{
    ColumnRole, QueryBoundaries, RoleMappedData, RoleMapping, TrainingData, DEFAULT_QUERY_BLOCK,
};

/// Schema and shape errors detected before any training or prediction work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing {role} column '{name}'")]
    MissingColumn { role: ColumnRole, name: String },

    #[error("invalid {role} column '{name}': expected {expected}, got {got}")]
    InvalidColumnType {
        role: ColumnRole,
        name: String,
        expected: &'static str,
        got: ColumnType,
    },

    #[error("features column '{name}' must have a known vector size")]
    UnknownFeatureDimension { name: String },

    #[error("features column '{name}' has dimension {got}, model expects {expected}")]
    FeatureDimensionMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("column '{name}' has {got} rows, expected {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate column '{name}'")]
    DuplicateColumn { name: String },

    #[error("dataset has no rows")]
    EmptyDataset,
}
