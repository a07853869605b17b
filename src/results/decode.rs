use chrono::NaiveDateTime;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::column::Column;
use crate::error::DataHelperError;
use crate::types::{SqlValue, TIMESTAMP_FORMAT};

/// A column value that cannot be represented in the requested Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl TypeMismatch {
    fn new(expected: &'static str, value: &SqlValue) -> Self {
        Self {
            expected,
            found: value.kind_name(),
        }
    }

    pub(crate) fn into_error(self, column: &str) -> DataHelperError {
        DataHelperError::TypeConversion {
            column: column.to_owned(),
            expected: self.expected,
            found: self.found,
        }
    }
}

pub(crate) fn column_label(columns: &[Column], idx: usize) -> String {
    columns
        .get(idx)
        .map_or_else(|| format!("#{idx}"), |c| c.name().to_owned())
}

/// Decode one column value into a Rust type.
///
/// NULL only decodes into `Option<T>` and `SqlValue`.
pub trait FromValue: Sized {
    /// # Errors
    /// Returns `TypeMismatch` when the value has no representation in `Self`.
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch>;
}

impl FromValue for SqlValue {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        match value {
            SqlValue::Int(i) => Ok(*i),
            SqlValue::Bool(b) => Ok(i64::from(*b)),
            other => Err(TypeMismatch::new("i64", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        let wide = i64::from_value(value).map_err(|_| TypeMismatch::new("i32", value))?;
        i32::try_from(wide).map_err(|_| TypeMismatch {
            expected: "i32",
            found: "out-of-range integer",
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        value
            .as_float()
            .ok_or_else(|| TypeMismatch::new("f64", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        value.as_bool().ok_or_else(|| TypeMismatch::new("bool", value))
    }
}

impl FromValue for String {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Int(i) => Ok(i.to_string()),
            SqlValue::Float(f) => Ok(f.to_string()),
            SqlValue::Bool(b) => Ok(b.to_string()),
            SqlValue::Timestamp(dt) => Ok(dt.format(TIMESTAMP_FORMAT).to_string()),
            SqlValue::Json(JsonValue::String(s)) => Ok(s.clone()),
            SqlValue::Json(other) => Ok(other.to_string()),
            SqlValue::Blob(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| TypeMismatch::new("String", value)),
            SqlValue::Null => Err(TypeMismatch::new("String", value)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        match value {
            SqlValue::Blob(bytes) => Ok(bytes.clone()),
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(TypeMismatch::new("Vec<u8>", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        value
            .as_timestamp()
            .ok_or_else(|| TypeMismatch::new("NaiveDateTime", value))
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        match value {
            SqlValue::Json(json) => Ok(json.clone()),
            SqlValue::Text(s) => {
                serde_json::from_str(s).map_err(|_| TypeMismatch::new("serde_json::Value", value))
            }
            SqlValue::Int(i) => Ok(JsonValue::from(*i)),
            SqlValue::Float(f) => Ok(JsonValue::from(*f)),
            SqlValue::Bool(b) => Ok(JsonValue::from(*b)),
            other => Err(TypeMismatch::new("serde_json::Value", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &SqlValue) -> Result<Self, TypeMismatch> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// A destination `Rows::scan` can decode a column into.
pub trait ScanDest {
    /// # Errors
    /// Returns `TypeMismatch` when the value has no representation in the destination.
    fn scan_from(&mut self, value: &SqlValue) -> Result<(), TypeMismatch>;
}

impl<T: FromValue> ScanDest for T {
    fn scan_from(&mut self, value: &SqlValue) -> Result<(), TypeMismatch> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

/// Decode a whole row into one element of `DataHelper::query_array`.
pub trait FromRow: Sized {
    /// # Errors
    /// Returns `ArrayTypeNotSupported` when a single-value element is asked to hold a
    /// multi-column row, `ColumnCountMismatch` for tuples of the wrong arity, and
    /// `TypeConversion` for undecodable columns.
    fn from_row(columns: &[Column], values: &[SqlValue]) -> Result<Self, DataHelperError>;
}

fn single_value<T: FromValue>(
    columns: &[Column],
    values: &[SqlValue],
    type_name: &str,
) -> Result<T, DataHelperError> {
    match values {
        [value] => T::from_value(value).map_err(|m| m.into_error(&column_label(columns, 0))),
        _ => Err(DataHelperError::ArrayTypeNotSupported(format!(
            "{type_name} elements hold one column but the result has {}",
            values.len()
        ))),
    }
}

macro_rules! scalar_from_row {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn from_row(columns: &[Column], values: &[SqlValue]) -> Result<Self, DataHelperError> {
                    single_value(columns, values, stringify!($ty))
                }
            }
        )*
    };
}

scalar_from_row!(i64, i32, f64, bool, String, Vec<u8>, NaiveDateTime, JsonValue, SqlValue);

impl<T: FromValue> FromRow for Option<T> {
    fn from_row(columns: &[Column], values: &[SqlValue]) -> Result<Self, DataHelperError> {
        single_value(columns, values, "Option")
    }
}

impl FromRow for Vec<SqlValue> {
    fn from_row(_columns: &[Column], values: &[SqlValue]) -> Result<Self, DataHelperError> {
        Ok(values.to_vec())
    }
}

impl FromRow for JsonMap<String, JsonValue> {
    fn from_row(columns: &[Column], values: &[SqlValue]) -> Result<Self, DataHelperError> {
        if columns.len() != values.len() {
            return Err(DataHelperError::ColumnCountMismatch {
                columns: columns.len(),
                destinations: values.len(),
            });
        }
        Ok(columns
            .iter()
            .zip(values)
            .map(|(column, value)| (column.name().to_owned(), to_json(value)))
            .collect())
    }
}

fn to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(b) => JsonValue::from(*b),
        SqlValue::Int(i) => JsonValue::from(*i),
        SqlValue::Float(f) => JsonValue::from(*f),
        SqlValue::Text(s) => JsonValue::from(s.as_str()),
        SqlValue::Timestamp(dt) => JsonValue::from(dt.format(TIMESTAMP_FORMAT).to_string()),
        SqlValue::Blob(bytes) => JsonValue::from(bytes.clone()),
        SqlValue::Json(json) => json.clone(),
    }
}

macro_rules! tuple_from_row {
    ($len:literal => $($idx:tt $T:ident),+) => {
        impl<$($T: FromValue),+> FromRow for ($($T,)+) {
            fn from_row(columns: &[Column], values: &[SqlValue]) -> Result<Self, DataHelperError> {
                if values.len() != $len {
                    return Err(DataHelperError::ColumnCountMismatch {
                        columns: values.len(),
                        destinations: $len,
                    });
                }
                Ok(($(
                    $T::from_value(&values[$idx])
                        .map_err(|m| m.into_error(&column_label(columns, $idx)))?,
                )+))
            }
        }
    };
}

tuple_from_row!(1 => 0 A);
tuple_from_row!(2 => 0 A, 1 B);
tuple_from_row!(3 => 0 A, 1 B, 2 C);
tuple_from_row!(4 => 0 A, 1 B, 2 C, 3 D);
tuple_from_row!(5 => 0 A, 1 B, 2 C, 3 D, 4 E);
tuple_from_row!(6 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
