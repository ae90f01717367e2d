//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError, TypeErrorKind};
use crate::value::Value;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// Wrapped in `Arc` so all rows from the same query share the same column
/// information.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get the name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Rows provide both index-based and name-based access to column values.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values in order
    values: Vec<Value>,
    /// Shared column metadata
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get the shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Get a typed value by column index.
    #[allow(clippy::result_large_err)]
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::Type(TypeError {
                kind: TypeErrorKind::UnsupportedConversion,
                expected: std::any::type_name::<T>(),
                actual: format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
                column: None,
            })
        })?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                kind: TypeErrorKind::UnsupportedConversion,
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    #[allow(clippy::result_large_err)]
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, value: &Value) -> Result<T> {
    Err(Error::Type(TypeError {
        kind: TypeErrorKind::UnsupportedConversion,
        expected,
        actual: value.type_name().to_string(),
        column: None,
    }))
}

fn overflow<T>(expected: &'static str, actual: impl std::fmt::Display) -> Result<T> {
    Err(Error::Type(TypeError {
        kind: TypeErrorKind::Overflow,
        expected,
        actual: format!("value {} out of range", actual),
        column: None,
    }))
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value.as_bool() {
            Some(v) => Ok(v),
            None => mismatch("bool", value),
        }
    }
}

impl FromValue for i8 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::TinyInt(v) => Ok(*v),
            Value::Bool(v) => Ok(i8::from(*v)),
            _ => mismatch("i8", value),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::TinyInt(v) => Ok(i16::from(*v)),
            Value::SmallInt(v) | Value::Year(v) => Ok(*v),
            Value::Bool(v) => Ok(i16::from(*v)),
            _ => mismatch("i16", value),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::TinyInt(v) => Ok(i32::from(*v)),
            Value::SmallInt(v) | Value::Year(v) => Ok(i32::from(*v)),
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(i32::from(*v)),
            _ => mismatch("i32", value),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value.as_i64() {
            Some(v) => Ok(v),
            None => mismatch("i64", value),
        }
    }
}

macro_rules! from_value_unsigned {
    ($ty:ty) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                if let Value::UnsignedBigInt(v) = value {
                    return <$ty>::try_from(*v)
                        .map_err(|_| ())
                        .or_else(|()| overflow(stringify!($ty), v));
                }
                let v = match value.as_i64() {
                    Some(v) => v,
                    None => return mismatch(stringify!($ty), value),
                };
                <$ty>::try_from(v)
                    .map_err(|_| ())
                    .or_else(|()| overflow(stringify!($ty), v))
            }
        }
    };
}

from_value_unsigned!(u8);
from_value_unsigned!(u16);
from_value_unsigned!(u32);
from_value_unsigned!(u64);

#[allow(clippy::cast_possible_truncation)]
impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Double(v) => Ok(*v as f32),
            _ => match value.as_f64() {
                Some(v) => Ok(v as f32),
                None => mismatch("f32", value),
            },
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value.as_f64() {
            Some(v) => Ok(v),
            None => mismatch("f64", value),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            _ => mismatch("String", value),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => mismatch("Vec<u8>", value),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(*v),
            Value::DateTime(v) => Ok(v.date()),
            _ => mismatch("NaiveDate", value),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Time(v) => Ok(*v),
            Value::DateTime(v) => Ok(v.time()),
            _ => mismatch("NaiveTime", value),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(*v),
            Value::Date(v) => Ok(v.and_hms_opt(0, 0, 0).unwrap_or_default()),
            _ => mismatch("NaiveDateTime", value),
        }
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::OffsetDateTime(v) => Ok(*v),
            Value::Instant(v) => Ok(v.fixed_offset()),
            _ => mismatch("DateTime<FixedOffset>", value),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Instant(v) => Ok(*v),
            Value::OffsetDateTime(v) => Ok(v.with_timezone(&Utc)),
            _ => mismatch("DateTime<Utc>", value),
        }
    }
}

impl FromValue for Duration {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Duration(v) => Ok(*v),
            Value::Time(v) => Ok(v.signed_duration_since(NaiveTime::MIN)),
            _ => mismatch("Duration", value),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| {
                Error::Type(TypeError {
                    kind: TypeErrorKind::ParseSyntax,
                    expected: "valid JSON",
                    actual: format!("invalid JSON: {}", e),
                    column: None,
                })
            }),
            _ => mismatch("JSON", value),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_basic_access() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(1), Value::Text("Alice".to_string())],
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(row.get(2), None);
        assert_eq!(row.get_by_name("id"), Some(&Value::Int(1)));
        assert_eq!(row.get_by_name("missing"), None);
        assert!(row.contains_column("name"));
    }

    #[test]
    fn row_typed_access() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(42), Value::Text("Bob".to_string())],
        );

        assert_eq!(row.get_as::<i32>(0).unwrap(), 42);
        assert_eq!(row.get_as::<i64>(0).unwrap(), 42);
        assert_eq!(row.get_named::<String>("name").unwrap(), "Bob");
        assert!(row.get_named::<i32>("name").is_err());
        assert!(row.get_as::<i32>(99).is_err());
    }

    #[test]
    fn row_null_handling() {
        let row = Row::new(vec!["nullable".to_string()], vec![Value::Null]);

        assert_eq!(row.get_named::<Option<i32>>("nullable").unwrap(), None);
        assert!(row.get_named::<i32>("nullable").is_err());
    }

    #[test]
    fn unsigned_range_checks() {
        assert_eq!(u8::from_value(&Value::Int(200)).unwrap(), 200);
        assert!(u8::from_value(&Value::Int(300)).is_err());
        assert!(u16::from_value(&Value::Int(-1)).is_err());
        assert_eq!(
            u64::from_value(&Value::UnsignedBigInt(u64::MAX)).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn temporal_conversions() {
        let date = NaiveDate::from_ymd_opt(2021, 5, 3).unwrap();
        let datetime = date.and_hms_opt(15, 2, 7).unwrap();

        assert_eq!(
            NaiveDate::from_value(&Value::DateTime(datetime)).unwrap(),
            date
        );
        assert_eq!(
            NaiveDateTime::from_value(&Value::Date(date)).unwrap(),
            date.and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(
            Duration::from_value(&Value::Duration(Duration::seconds(-30))).unwrap(),
            Duration::seconds(-30)
        );
    }

    #[test]
    fn shared_column_info() {
        let columns = Arc::new(ColumnInfo::new(vec!["a".to_string(), "b".to_string()]));
        let row1 = Row::with_columns(Arc::clone(&columns), vec![Value::Int(1), Value::Int(2)]);
        let row2 = Row::with_columns(Arc::clone(&columns), vec![Value::Int(3), Value::Int(4)]);

        assert!(Arc::ptr_eq(&row1.column_info(), &row2.column_info()));
        assert_eq!(row2.get_named::<i32>("b").unwrap(), 4);
    }
}
