//! Record metadata and dynamic field access
//!
//! This module provides the `ModelTrait` implemented by both parent and child
//! record types. The cluster layer never knows concrete field types: it reads and
//! writes columns as `sea_query::Value` through `get`/`set`, and uses the static
//! [`ModelMeta`] to learn the table, primary key, persisted columns and default
//! ordering of a record type.

use crate::value::{is_null, FromValue, ValueExtractionError, ValueMap};
use sea_query::Value;
use std::fmt::Debug;

/// One default-ordering field of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderBy {
    /// Ascending on the named column
    Asc(&'static str),
    /// Descending on the named column
    Desc(&'static str),
}

impl OrderBy {
    /// Parse the textual form where a leading `-` means descending.
    ///
    /// ```rust
    /// use lifeguard_cluster::model::OrderBy;
    ///
    /// assert_eq!(OrderBy::parse("name"), OrderBy::Asc("name"));
    /// assert_eq!(OrderBy::parse("-sort_order"), OrderBy::Desc("sort_order"));
    /// ```
    pub fn parse(field: &'static str) -> Self {
        match field.strip_prefix('-') {
            Some(column) => OrderBy::Desc(column),
            None => OrderBy::Asc(field),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            OrderBy::Asc(column) | OrderBy::Desc(column) => column,
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, OrderBy::Desc(_))
    }
}

/// Static metadata of a record type
///
/// # Example
///
/// ```rust
/// use lifeguard_cluster::model::{ModelMeta, OrderBy};
///
/// static BAND_MEMBER: ModelMeta = ModelMeta {
///     table: "band_members",
///     primary_key: "id",
///     columns: &["id", "band_id", "name"],
///     ordering: &[OrderBy::Asc("name")],
/// };
/// assert!(BAND_MEMBER.has_column("band_id"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelMeta {
    /// Table the records live in
    pub table: &'static str,
    /// Primary-key column; an empty name means the type has none
    pub primary_key: &'static str,
    /// Persisted columns, primary key included
    pub columns: &'static [&'static str],
    /// Default ordering applied to staged lists and live fetches
    pub ordering: &'static [OrderBy],
}

impl ModelMeta {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    /// Columns written on insert/update (everything but the primary key).
    pub fn writable_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        let primary_key = self.primary_key;
        self.columns.iter().copied().filter(move |c| *c != primary_key)
    }
}

/// Error type for model field access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Invalid value type for the column
    InvalidValueType {
        column: String,
        expected: String,
        actual: String,
    },
    /// Column not found
    ColumnNotFound(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::InvalidValueType {
                column,
                expected,
                actual,
            } => write!(
                f,
                "Invalid value type for column {}: expected {}, got {}",
                column, expected, actual
            ),
            ModelError::ColumnNotFound(column) => {
                write!(f, "Column not found: {}", column)
            }
            ModelError::Other(msg) => write!(f, "Model error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Trait for record-level operations
///
/// Implementations map column names onto struct fields. Everything else has a
/// default built on `meta`, `get` and `set`.
///
/// # Example
///
/// ```rust
/// use lifeguard_cluster::model::{set_field, ModelError, ModelMeta, ModelTrait};
/// use sea_query::Value;
///
/// static BAND: ModelMeta = ModelMeta {
///     table: "bands",
///     primary_key: "id",
///     columns: &["id", "name"],
///     ordering: &[],
/// };
///
/// #[derive(Debug, Clone, Default)]
/// struct Band {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl ModelTrait for Band {
///     fn meta() -> &'static ModelMeta {
///         &BAND
///     }
///
///     fn get(&self, column: &str) -> Option<Value> {
///         match column {
///             "id" => Some(Value::BigInt(self.id)),
///             "name" => Some(Value::String(Some(self.name.clone()))),
///             _ => None,
///         }
///     }
///
///     fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
///         match column {
///             "id" => set_field(&mut self.id, column, value),
///             "name" => set_field(&mut self.name, column, value),
///             _ => Err(ModelError::ColumnNotFound(column.to_string())),
///         }
///     }
/// }
///
/// let band = Band { id: None, name: "The Beatles".to_string() };
/// assert!(band.primary_key().is_none());
/// assert_eq!(band.to_values().len(), 2);
/// ```
pub trait ModelTrait: Clone + Default + Debug + 'static {
    /// Static metadata for this record type
    fn meta() -> &'static ModelMeta;

    /// Get the value of a column, `None` if the column is unknown
    fn get(&self, column: &str) -> Option<Value>;

    /// Set the value of a column
    ///
    /// # Errors
    ///
    /// Returns `ModelError` for unknown columns or values of the wrong type.
    fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError>;

    /// The primary-key value, or `None` while the record is unsaved
    fn primary_key(&self) -> Option<Value> {
        let primary_key = Self::meta().primary_key;
        if primary_key.is_empty() {
            return None;
        }
        self.get(primary_key).filter(|value| !is_null(value))
    }

    /// Assign the primary key, typically after an insert returned it
    fn set_primary_key(&mut self, key: Value) -> Result<(), ModelError> {
        let primary_key = Self::meta().primary_key;
        if primary_key.is_empty() {
            return Err(ModelError::Other(format!(
                "{} has no primary-key column",
                Self::meta().table
            )));
        }
        self.set(primary_key, key)
    }

    /// Every persisted column with its current value
    fn to_values(&self) -> ValueMap {
        Self::meta()
            .columns
            .iter()
            .filter_map(|column| self.get(column).map(|value| (column.to_string(), value)))
            .collect()
    }

    /// Build a record from column values; columns absent from `values` keep
    /// their `Default` value and unknown keys are ignored.
    fn from_values(values: &ValueMap) -> Result<Self, ModelError> {
        let mut model = Self::default();
        for column in Self::meta().columns {
            if let Some(value) = values.get(*column) {
                model.set(column, value.clone())?;
            }
        }
        Ok(model)
    }
}

/// Store `value` into `field`, mapping extraction failures to `ModelError`.
///
/// A null written into a non-`Option` field is reported as an invalid value type.
pub fn set_field<T: FromValue>(field: &mut T, column: &str, value: Value) -> Result<(), ModelError> {
    let actual = format!("{:?}", value);
    match T::from_value(value) {
        Ok(v) => {
            *field = v;
            Ok(())
        }
        Err(ValueExtractionError::NullValue) => Err(ModelError::InvalidValueType {
            column: column.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            actual,
        }),
        Err(ValueExtractionError::TypeMismatch { expected, actual }) => {
            Err(ModelError::InvalidValueType {
                column: column.to_string(),
                expected,
                actual,
            })
        }
        Err(ValueExtractionError::ConversionError(msg)) => Err(ModelError::InvalidValueType {
            column: column.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            actual: msg,
        }),
    }
}
