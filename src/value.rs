//! Value plumbing between `sea_query::Value`, `may_postgres` and record types.
//!
//! - [`with_converted_params`] binds sea-query `Values` as `ToSql` parameters.
//! - [`row_to_values`] reads a result row back into a [`ValueMap`].
//! - [`FromValue`] extracts typed fields from a `Value` (used by `ModelTrait::set`).
//! - [`values_equal`] / [`compare_values`] compare values the way identity
//!   matching and default ordering need: integer widths are interchangeable.

use crate::executor::LifeError;
use may_postgres::types::{ToSql, Type};
use may_postgres::Row;
use sea_query::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Column name to value, the storage-neutral shape of one record.
pub type ValueMap = BTreeMap<String, Value>;

/// Convert SeaQuery values to may_postgres ToSql parameters and run `f` with them.
///
/// Every value is boxed with a Rust type that matches its SQL type, nulls
/// included, so PostgreSQL's parameter type inference sees the right OID.
///
/// # Errors
///
/// Returns `LifeError::Other` if an unsupported value type is encountered.
pub fn with_converted_params<F, R>(values: &sea_query::Values, f: F) -> Result<R, LifeError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, LifeError>,
{
    let mut owned: Vec<Box<dyn ToSql>> = Vec::with_capacity(values.0.len());
    for value in values.iter() {
        owned.push(to_sql_param(value)?);
    }
    let params: Vec<&dyn ToSql> = owned.iter().map(|param| param.as_ref()).collect();
    f(&params)
}

fn to_sql_param(value: &Value) -> Result<Box<dyn ToSql>, LifeError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i16::from)),
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i16::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(Some(u)) => {
            let signed = i64::try_from(*u).map_err(|_| {
                LifeError::Other(format!(
                    "BigUnsigned value {} exceeds i64::MAX ({}), cannot be safely cast to i64",
                    u,
                    i64::MAX
                ))
            })?;
            Box::new(Some(signed))
        }
        Value::BigUnsigned(None) => Box::new(None::<i64>),
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::String(v) => Box::new(v.clone()),
        Value::Char(v) => Box::new(v.map(|c| c.to_string())),
        Value::Bytes(v) => Box::new(v.clone()),
        Value::Json(Some(j)) => Box::new(Some(serde_json::to_string(&**j).map_err(|e| {
            LifeError::Other(format!("Failed to serialize JSON: {}", e))
        })?)),
        Value::Json(None) => Box::new(None::<String>),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(LifeError::Other(format!(
                "Unsupported value type in query: {:?}",
                value
            )));
        }
    };
    Ok(param)
}

/// Read every column of `row` into a [`ValueMap`].
///
/// # Errors
///
/// Returns `LifeError::ParseError` for column types the cluster layer does not map.
pub fn row_to_values(row: &Row) -> Result<ValueMap, LifeError> {
    let mut values = ValueMap::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            Value::Bool(row.try_get::<_, Option<bool>>(idx)?)
        } else if *ty == Type::INT2 {
            Value::SmallInt(row.try_get::<_, Option<i16>>(idx)?)
        } else if *ty == Type::INT4 {
            Value::Int(row.try_get::<_, Option<i32>>(idx)?)
        } else if *ty == Type::INT8 {
            Value::BigInt(row.try_get::<_, Option<i64>>(idx)?)
        } else if *ty == Type::FLOAT4 {
            Value::Float(row.try_get::<_, Option<f32>>(idx)?)
        } else if *ty == Type::FLOAT8 {
            Value::Double(row.try_get::<_, Option<f64>>(idx)?)
        } else if *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
        {
            Value::String(row.try_get::<_, Option<String>>(idx)?)
        } else if *ty == Type::BYTEA {
            Value::Bytes(row.try_get::<_, Option<Vec<u8>>>(idx)?)
        } else {
            return Err(LifeError::ParseError(format!(
                "Unsupported column type {} for column {}",
                ty,
                column.name()
            )));
        };
        values.insert(column.name().to_string(), value);
    }
    Ok(values)
}

/// Whether `value` is one of the typed SQL NULLs.
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Json(None)
    )
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::TinyInt(Some(v)) => Some(i128::from(*v)),
        Value::SmallInt(Some(v)) => Some(i128::from(*v)),
        Value::Int(Some(v)) => Some(i128::from(*v)),
        Value::BigInt(Some(v)) => Some(i128::from(*v)),
        Value::TinyUnsigned(Some(v)) => Some(i128::from(*v)),
        Value::SmallUnsigned(Some(v)) => Some(i128::from(*v)),
        Value::Unsigned(Some(v)) => Some(i128::from(*v)),
        Value::BigUnsigned(Some(v)) => Some(i128::from(*v)),
        _ => None,
    }
}

/// Integer value of any width that fits in `i64`
pub fn as_i64(value: &Value) -> Option<i64> {
    as_integer(value).and_then(|v| i64::try_from(v).ok())
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(v)) => Some(f64::from(*v)),
        Value::Double(Some(v)) => Some(*v),
        _ => None,
    }
}

/// Equality for keys and foreign keys: `Int(5)` equals `BigInt(5)`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order used for default-ordering sorts, matching PostgreSQL's
/// `ORDER BY` defaults: NULL sorts after every value and NaN after every other
/// number. Values of unrelated types are grouped by type.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (is_null(a), is_null(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    match (as_integer(a), as_integer(b), as_float(a), as_float(b)) {
        (Some(x), Some(y), _, _) => return x.cmp(&y),
        (Some(x), None, _, Some(y)) => return compare_integer_float(x, y),
        (None, Some(y), Some(x), _) => return compare_integer_float(y, x).reverse(),
        (_, _, Some(x), Some(y)) => return compare_floats(x, y),
        _ => {}
    }
    match (a, b) {
        (Value::String(Some(x)), Value::String(Some(y))) => x.cmp(y),
        (Value::Char(Some(x)), Value::Char(Some(y))) => x.cmp(y),
        (Value::Bool(Some(x)), Value::Bool(Some(y))) => x.cmp(y),
        (Value::Bytes(Some(x)), Value::Bytes(Some(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        _ if as_integer(value).is_some() || as_float(value).is_some() => 0,
        Value::String(_) => 1,
        Value::Char(_) => 2,
        Value::Bool(_) => 3,
        Value::Bytes(_) => 4,
        _ => 5,
    }
}

// NaN equals NaN and sorts last; -0.0 equals 0.0
fn compare_floats(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => (x + 0.0).total_cmp(&(y + 0.0)),
    }
}

// Exact: `x as f64` may round, so a tie is settled on the integer side.
fn compare_integer_float(x: i128, y: f64) -> Ordering {
    if y.is_nan() {
        return Ordering::Less;
    }
    match compare_floats(x as f64, y) {
        Ordering::Equal => x.cmp(&(y as i128)),
        ord => ord,
    }
}

/// Error type for value extraction failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExtractionError {
    /// The value is null (None variant)
    NullValue,
    /// The value type doesn't match the expected type
    TypeMismatch { expected: String, actual: String },
    /// Value conversion failed (e.g., overflow)
    ConversionError(String),
}

impl fmt::Display for ValueExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExtractionError::NullValue => write!(f, "Value is null"),
            ValueExtractionError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, actual)
            }
            ValueExtractionError::ConversionError(msg) => {
                write!(f, "Conversion error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValueExtractionError {}

/// Typed extraction from `sea_query::Value`.
///
/// ```rust
/// use lifeguard_cluster::value::{FromValue, ValueExtractionError};
/// use sea_query::Value;
///
/// assert_eq!(i64::from_value(Value::Int(Some(42))), Ok(42));
/// assert_eq!(Option::<String>::from_value(Value::String(None)), Ok(None));
/// assert!(matches!(i32::from_value(Value::Int(None)), Err(ValueExtractionError::NullValue)));
/// ```
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError>;
}

fn mismatch(expected: &str, value: &Value) -> ValueExtractionError {
    ValueExtractionError::TypeMismatch {
        expected: expected.to_string(),
        actual: format!("{:?}", value),
    }
}

macro_rules! impl_from_integer_value {
    ($type:ty, $expected:expr) => {
        impl FromValue for $type {
            fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
                if is_null(&value) {
                    return Err(ValueExtractionError::NullValue);
                }
                match as_integer(&value) {
                    Some(v) => <$type>::try_from(v).map_err(|_| {
                        ValueExtractionError::ConversionError(format!(
                            "{} does not fit in {}",
                            v, $expected
                        ))
                    }),
                    None => Err(mismatch($expected, &value)),
                }
            }
        }
    };
}

impl_from_integer_value!(i16, "i16");
impl_from_integer_value!(i32, "i32");
impl_from_integer_value!(i64, "i64");
impl_from_integer_value!(u32, "u32");
impl_from_integer_value!(u64, "u64");

macro_rules! impl_from_value {
    ($type:ty, $variant:ident, $expected:expr) => {
        impl FromValue for $type {
            fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
                match value {
                    Value::$variant(Some(v)) => Ok(v),
                    Value::$variant(None) => Err(ValueExtractionError::NullValue),
                    other => Err(mismatch($expected, &other)),
                }
            }
        }
    };
}

impl_from_value!(bool, Bool, "Bool");
impl_from_value!(String, String, "String");
impl_from_value!(Vec<u8>, Bytes, "Bytes");

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        if is_null(&value) {
            return Err(ValueExtractionError::NullValue);
        }
        as_float(&value)
            .or_else(|| as_integer(&value).map(|v| v as f64))
            .ok_or_else(|| mismatch("f64", &value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        match T::from_value(value) {
            Ok(v) => Ok(Some(v)),
            Err(ValueExtractionError::NullValue) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
