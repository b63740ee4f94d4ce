//! Column roles and conversion to the internal training representation.

use std::fmt;
use std::ops::Range;

use ndarray::Array2;

use super::dataset::{Column, ColumnType, Dataset};
use super::SchemaError;

/// Rows per query when the data carries no group-id column.
pub const DEFAULT_QUERY_BLOCK: usize = 1024;

// =============================================================================
// Roles
// =============================================================================

/// Role a column plays during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Label,
    Features,
    Weight,
    GroupId,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Label => "label",
            Self::Features => "features",
            Self::Weight => "weight",
            Self::GroupId => "group id",
        };
        f.write_str(s)
    }
}

/// Maps roles to column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    pub label: String,
    pub features: String,
    pub weight: Option<String>,
    pub group_id: Option<String>,
}

impl Default for RoleMapping {
    fn default() -> Self {
        Self::new("Label", "Features")
    }
}

impl RoleMapping {
    pub fn new(label: impl Into<String>, features: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            features: features.into(),
            weight: None,
            group_id: None,
        }
    }

    pub fn with_weight(mut self, name: impl Into<String>) -> Self {
        self.weight = Some(name.into());
        self
    }

    pub fn with_group_id(mut self, name: impl Into<String>) -> Self {
        self.group_id = Some(name.into());
        self
    }
}

/// A dataset together with its role mapping.
#[derive(Debug, Clone, Copy)]
pub struct RoleMappedData<'a> {
    data: &'a Dataset,
    roles: &'a RoleMapping,
}

impl<'a> RoleMappedData<'a> {
    pub fn new(data: &'a Dataset, roles: &'a RoleMapping) -> Self {
        Self { data, roles }
    }

    pub fn data(&self) -> &'a Dataset {
        self.data
    }

    pub fn roles(&self) -> &'a RoleMapping {
        self.roles
    }

    fn require(&self, role: ColumnRole, name: &str) -> Result<&'a Column, SchemaError> {
        self.data.column(name).ok_or_else(|| SchemaError::MissingColumn {
            role,
            name: name.to_string(),
        })
    }

    fn float_column(&self, role: ColumnRole, name: &str) -> Result<&'a [f32], SchemaError> {
        match self.require(role, name)? {
            Column::Float(values) => Ok(values),
            other => Err(SchemaError::InvalidColumnType {
                role,
                name: name.to_string(),
                expected: "float",
                got: other.column_type(),
            }),
        }
    }

    fn key_column(&self, role: ColumnRole, name: &str) -> Result<&'a [u32], SchemaError> {
        match self.require(role, name)? {
            Column::Key(ids) => Ok(ids),
            other => Err(SchemaError::InvalidColumnType {
                role,
                name: name.to_string(),
                expected: "key",
                got: other.column_type(),
            }),
        }
    }

    /// Validate the role mapping and return the feature vector dimension.
    ///
    /// Checks, in order: label (float), features (float vector of known
    /// size), weight (float, optional) and group id (key, optional).
    pub fn validate(&self) -> Result<usize, SchemaError> {
        let roles = self.roles;
        self.float_column(ColumnRole::Label, &roles.label)?;

        let n_features = match self.require(ColumnRole::Features, &roles.features)?.column_type() {
            ColumnType::Vector { dim: Some(dim) } => dim,
            ColumnType::Vector { dim: None } => {
                return Err(SchemaError::UnknownFeatureDimension {
                    name: roles.features.clone(),
                })
            }
            got => {
                return Err(SchemaError::InvalidColumnType {
                    role: ColumnRole::Features,
                    name: roles.features.clone(),
                    expected: "vector<float>",
                    got,
                })
            }
        };

        if let Some(weight) = &roles.weight {
            self.float_column(ColumnRole::Weight, weight)?;
        }

        if let Some(group) = &roles.group_id {
            self.key_column(ColumnRole::GroupId, group)?;
        }

        if self.data.n_rows() == 0 {
            return Err(SchemaError::EmptyDataset);
        }

        Ok(n_features)
    }

    /// Validate and convert into the dense training representation.
    pub fn to_training_data(&self) -> Result<TrainingData, SchemaError> {
        let n_features = self.validate()?;
        let roles = self.roles;
        let n_rows = self.data.n_rows();

        let labels = self.float_column(ColumnRole::Label, &roles.label)?.to_vec();
        let features = match self.require(ColumnRole::Features, &roles.features)? {
            Column::Vector(arr) => arr.as_standard_layout().into_owned(),
            _ => {
                return Err(SchemaError::UnknownFeatureDimension {
                    name: roles.features.clone(),
                })
            }
        };
        debug_assert_eq!(features.dim(), (n_rows, n_features));

        let weights = match &roles.weight {
            Some(name) => Some(self.float_column(ColumnRole::Weight, name)?.to_vec()),
            None => None,
        };

        let queries = match &roles.group_id {
            Some(name) => QueryBoundaries::from_group_ids(self.key_column(ColumnRole::GroupId, name)?),
            None => QueryBoundaries::uniform(n_rows, DEFAULT_QUERY_BLOCK),
        };

        Ok(TrainingData {
            features,
            labels,
            weights,
            queries,
        })
    }
}

// =============================================================================
// Query Boundaries
// =============================================================================

/// Partition of the training examples into contiguous queries.
///
/// Query `q` covers the half-open range `offsets[q]..offsets[q + 1]`. The
/// ranges never overlap and together cover `0..n_examples`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBoundaries {
    offsets: Vec<usize>,
}

impl QueryBoundaries {
    /// Build from raw offsets.
    ///
    /// Offsets must start at 0 and be non-decreasing; returns `None` otherwise.
    pub fn from_offsets(offsets: Vec<usize>) -> Option<Self> {
        let valid = offsets.first() == Some(&0) && offsets.windows(2).all(|w| w[0] <= w[1]);
        valid.then_some(Self { offsets })
    }

    /// One query per run of equal consecutive group ids.
    pub fn from_group_ids(ids: &[u32]) -> Self {
        let mut offsets = vec![0];
        for i in 1..ids.len() {
            if ids[i] != ids[i - 1] {
                offsets.push(i);
            }
        }
        if !ids.is_empty() {
            offsets.push(ids.len());
        }
        Self { offsets }
    }

    /// Fixed-size blocks of `block` rows (the last block may be shorter).
    pub fn uniform(n_examples: usize, block: usize) -> Self {
        let block = block.max(1);
        let mut offsets: Vec<usize> = (0..n_examples).step_by(block).collect();
        offsets.push(n_examples);
        if n_examples == 0 {
            offsets.truncate(1);
        }
        Self { offsets }
    }

    #[inline]
    pub fn n_queries(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn n_examples(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Example range of query `q`.
    #[inline]
    pub fn range(&self, q: usize) -> Range<usize> {
        self.offsets[q]..self.offsets[q + 1]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

// =============================================================================
// Training Data
// =============================================================================

/// Dense, validated training data.
#[derive(Debug, Clone)]
pub struct TrainingData {
    /// Sample-major features `[n_rows, n_features]`.
    pub features: Array2<f32>,
    pub labels: Vec<f32>,
    pub weights: Option<Vec<f32>>,
    pub queries: QueryBoundaries,
}

impl TrainingData {
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dataset() -> Dataset {
        Dataset::new()
            .with_column("Label", Column::Float(vec![1.0, 2.0, 3.0]))
            .unwrap()
            .with_column("Features", Column::Vector(array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]))
            .unwrap()
            .with_column("Weight", Column::Float(vec![1.0, 0.5, 2.0]))
            .unwrap()
            .with_column("Group", Column::Key(vec![7, 7, 3]))
            .unwrap()
            .with_column("Name", Column::Text(vec!["a".into(), "b".into(), "c".into()]))
            .unwrap()
    }

    #[test]
    fn valid_mapping_converts() {
        let data = dataset();
        let roles = RoleMapping::default().with_weight("Weight").with_group_id("Group");
        let training = RoleMappedData::new(&data, &roles).to_training_data().unwrap();

        assert_eq!(training.n_rows(), 3);
        assert_eq!(training.n_features(), 2);
        assert_eq!(training.labels, vec![1.0, 2.0, 3.0]);
        assert_eq!(training.weights.as_deref(), Some(&[1.0, 0.5, 2.0][..]));
        assert_eq!(training.queries.offsets(), &[0, 2, 3]);
    }

    #[test]
    fn missing_label_names_the_role() {
        let data = dataset();
        let roles = RoleMapping::new("Target", "Features");
        let err = RoleMappedData::new(&data, &roles).validate().unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { role: ColumnRole::Label, .. }));
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn text_label_is_rejected() {
        let data = dataset();
        let roles = RoleMapping::new("Name", "Features");
        let err = RoleMappedData::new(&data, &roles).validate().unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidColumnType { role: ColumnRole::Label, got: ColumnType::Text, .. }
        ));
    }

    #[test]
    fn scalar_features_are_rejected() {
        let data = dataset();
        let roles = RoleMapping::new("Label", "Weight");
        let err = RoleMappedData::new(&data, &roles).validate().unwrap_err();
        assert!(matches!(err, SchemaError::InvalidColumnType { role: ColumnRole::Features, .. }));
    }

    #[test]
    fn variable_length_features_are_rejected() {
        let data = Dataset::new()
            .with_column("Label", Column::Float(vec![1.0]))
            .unwrap()
            .with_column("Features", Column::VarVector(vec![vec![1.0, 2.0]]))
            .unwrap();
        let roles = RoleMapping::default();
        let err = RoleMappedData::new(&data, &roles).validate().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFeatureDimension { .. }));
    }

    #[test]
    fn float_group_id_is_rejected() {
        let data = dataset();
        let roles = RoleMapping::default().with_group_id("Weight");
        let err = RoleMappedData::new(&data, &roles).validate().unwrap_err();
        assert!(matches!(err, SchemaError::InvalidColumnType { role: ColumnRole::GroupId, .. }));
    }

    #[test]
    fn missing_weight_names_the_role() {
        let data = dataset();
        let roles = RoleMapping::default().with_weight("W");
        let err = RoleMappedData::new(&data, &roles).validate().unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { role: ColumnRole::Weight, .. }));
    }

    #[test]
    fn uniform_boundaries_cover_all_examples() {
        let q = QueryBoundaries::uniform(10, 4);
        assert_eq!(q.offsets(), &[0, 4, 8, 10]);
        assert_eq!(q.n_queries(), 3);
        assert_eq!(q.range(2), 8..10);
        assert_eq!(q.n_examples(), 10);

        let empty = QueryBoundaries::uniform(0, 4);
        assert_eq!(empty.n_queries(), 0);
        assert_eq!(empty.n_examples(), 0);
    }

    #[test]
    fn group_ids_split_on_change() {
        let q = QueryBoundaries::from_group_ids(&[1, 1, 2, 2, 2, 1]);
        assert_eq!(q.offsets(), &[0, 2, 5, 6]);
    }

    #[test]
    fn offsets_must_be_monotone() {
        assert!(QueryBoundaries::from_offsets(vec![0, 3, 2]).is_none());
        assert!(QueryBoundaries::from_offsets(vec![1, 2]).is_none());
        assert!(QueryBoundaries::from_offsets(vec![0, 2, 2, 5]).is_some());
    }
}
