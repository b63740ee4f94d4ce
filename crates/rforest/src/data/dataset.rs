//! Column-oriented in-memory dataset with a typed schema.

use std::fmt;

use ndarray::{Array2, ArrayView1};

use super::SchemaError;

// =============================================================================
// Columns
// =============================================================================

/// A single named column of a [`Dataset`].
#[derive(Debug, Clone)]
pub enum Column {
    /// Scalar float per row.
    Float(Vec<f32>),
    /// Fixed-size float vector per row, stored sample-major `[n_rows, dim]`.
    Vector(Array2<f32>),
    /// Float vector per row whose length may differ between rows.
    VarVector(Vec<Vec<f32>>),
    /// Key (categorical id) per row, used for group ids.
    Key(Vec<u32>),
    /// Free text per row.
    Text(Vec<String>),
}

impl Column {
    /// Number of rows in this column.
    pub fn n_rows(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Vector(arr) => arr.nrows(),
            Self::VarVector(rows) => rows.len(),
            Self::Key(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Type of this column.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Float(_) => ColumnType::Float,
            Self::Vector(arr) => ColumnType::Vector { dim: Some(arr.ncols()) },
            Self::VarVector(_) => ColumnType::Vector { dim: None },
            Self::Key(_) => ColumnType::Key,
            Self::Text(_) => ColumnType::Text,
        }
    }
}

/// Type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Float,
    /// Float vector; `dim` is `None` when the length varies per row.
    Vector { dim: Option<usize> },
    Key,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Vector { dim: Some(d) } => write!(f, "vector<float, {d}>"),
            Self::Vector { dim: None } => write!(f, "vector<float, ?>"),
            Self::Key => write!(f, "key"),
            Self::Text => write!(f, "text"),
        }
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Name and type of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
}

/// Ordered column names and types of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSchema {
    columns: Vec<ColumnMeta>,
}

impl DatasetSchema {
    /// Create a schema from `(name, type)` pairs.
    pub fn new(columns: impl IntoIterator<Item = (String, ColumnType)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, column_type)| ColumnMeta { name, column_type })
                .collect(),
        }
    }

    /// Look up a column by name.
    pub fn find(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// In-memory dataset of named, equally long columns.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use rforest::data::{Column, Dataset};
///
/// let data = Dataset::new()
///     .with_column("Label", Column::Float(vec![1.0, 2.0]))
///     .unwrap()
///     .with_column("Features", Column::Vector(array![[0.0, 1.0], [1.0, 0.0]]))
///     .unwrap();
/// assert_eq!(data.n_rows(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<(String, Column)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column.
    ///
    /// # Errors
    ///
    /// Fails if a column with the same name exists or if the row count differs
    /// from the columns already present.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self, SchemaError> {
        let name = name.into();
        if self.columns.iter().any(|(n, _)| *n == name) {
            return Err(SchemaError::DuplicateColumn { name });
        }
        if let Some((_, first)) = self.columns.first() {
            if first.n_rows() != column.n_rows() {
                return Err(SchemaError::RowCountMismatch {
                    name,
                    expected: first.n_rows(),
                    got: column.n_rows(),
                });
            }
        }
        self.columns.push((name, column));
        Ok(self)
    }

    /// Number of rows (0 for a dataset without columns).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.n_rows())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::new(
            self.columns
                .iter()
                .map(|(name, column)| (name.clone(), column.column_type())),
        )
    }
}

/// Borrowed access to one row of a vector column.
pub(crate) enum RowSlice<'a> {
    Contiguous(&'a [f32]),
    Strided(ArrayView1<'a, f32>),
}

impl RowSlice<'_> {
    /// Run `f` on the row as a contiguous slice, copying only if the row is strided.
    pub(crate) fn with_slice<T>(&self, f: impl FnOnce(&[f32]) -> T) -> T {
        match self {
            Self::Contiguous(s) => f(s),
            Self::Strided(view) => f(&view.to_vec()),
        }
    }
}

/// Row `idx` of a vector column, or `None` for non-vector columns.
pub(crate) fn vector_row(column: &Column, idx: usize) -> Option<RowSlice<'_>> {
    match column {
        Column::Vector(arr) => {
            let row = arr.row(idx);
            Some(match row.to_slice() {
                Some(s) => RowSlice::Contiguous(s),
                None => RowSlice::Strided(row),
            })
        }
        Column::VarVector(rows) => Some(RowSlice::Contiguous(&rows[idx])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn schema_reports_column_types() {
        let data = Dataset::new()
            .with_column("y", Column::Float(vec![1.0, 2.0]))
            .unwrap()
            .with_column("x", Column::Vector(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]))
            .unwrap()
            .with_column("g", Column::Key(vec![0, 0]))
            .unwrap();

        let schema = data.schema();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.find("y").unwrap().column_type, ColumnType::Float);
        assert_eq!(
            schema.find("x").unwrap().column_type,
            ColumnType::Vector { dim: Some(3) }
        );
        assert!(schema.find("missing").is_none());
    }

    #[test]
    fn row_count_mismatch_is_rejected() {
        let err = Dataset::new()
            .with_column("y", Column::Float(vec![1.0, 2.0]))
            .unwrap()
            .with_column("w", Column::Float(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::RowCountMismatch { expected: 2, got: 1, .. }));
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let err = Dataset::new()
            .with_column("y", Column::Float(vec![1.0]))
            .unwrap()
            .with_column("y", Column::Float(vec![2.0]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { .. }));
    }

    #[test]
    fn strided_rows_are_copied() {
        // Column-major storage: row 0 is [1.0, 3.0] with stride 2.
        let arr = array![[1.0f32, 2.0], [3.0, 4.0]].reversed_axes();
        let column = Column::Vector(arr);
        let row = vector_row(&column, 0).unwrap();
        assert!(matches!(row, RowSlice::Strided(_)));
        assert_eq!(row.with_slice(|s| s.to_vec()), vec![1.0, 3.0]);
    }
}
