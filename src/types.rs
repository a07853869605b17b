use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DataHelperError;

/// Values that can be bound as query parameters or read back from a result row.
///
/// The same enum is used by every driver so helper code does not need to branch on
/// backend types:
/// ```rust
/// use datahelper_lite::prelude::*;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Binary data
    Blob(Vec<u8>),
    /// JSON value
    Json(JsonValue),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Booleans, plus the integer 0/1 encoding `SQLite` uses for them.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Int(1) => Some(true),
            SqlValue::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // "YYYY-MM-DD HH:MM:SS" with optional fraction, space or 'T' separated
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let SqlValue::Json(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Blob(_) => "blob",
            SqlValue::Json(_) => "json",
        }
    }

    /// Textual wire form of the value; `None` for NULL.
    #[must_use]
    pub fn to_raw_bytes(&self) -> Option<Vec<u8>> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(if *b { b"1".to_vec() } else { b"0".to_vec() }),
            SqlValue::Int(i) => Some(i.to_string().into_bytes()),
            SqlValue::Float(f) => Some(f.to_string().into_bytes()),
            SqlValue::Text(s) => Some(s.as_bytes().to_vec()),
            SqlValue::Timestamp(dt) => Some(dt.format(TIMESTAMP_FORMAT).to_string().into_bytes()),
            SqlValue::Blob(bytes) => Some(bytes.clone()),
            SqlValue::Json(value) => Some(value.to_string().into_bytes()),
        }
    }
}

/// Text form used when timestamps are sent as strings.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        SqlValue::Json(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// The database backends this crate knows the dialect of.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    Postgres,
    /// `SQLite` database
    Sqlite,
    /// SQL Server database (dialect only; the driver is supplied externally)
    Mssql,
}

impl DatabaseType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Mssql => "mssql",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read types for data retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadType {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "key")]
    ByKey,
    #[serde(rename = "lkeys")]
    ByLateralKeys,
    #[serde(rename = "code")]
    ByCode,
    #[serde(rename = "form")]
    ForForm,
    #[serde(rename = "else")]
    Else,
}

impl ReadType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReadType::All => "all",
            ReadType::ByKey => "key",
            ReadType::ByLateralKeys => "lkeys",
            ReadType::ByCode => "code",
            ReadType::ForForm => "form",
            ReadType::Else => "else",
        }
    }
}

impl FromStr for ReadType {
    type Err = DataHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ReadType::All),
            "key" => Ok(ReadType::ByKey),
            "lkeys" => Ok(ReadType::ByLateralKeys),
            "code" => Ok(ReadType::ByCode),
            "form" => Ok(ReadType::ForForm),
            "else" => Ok(ReadType::Else),
            other => Err(DataHelperError::ConfigError(format!(
                "unknown read type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a record a retrieval returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    All,
    Form,
    Essential,
}

impl ReturnKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnKind::All => "all",
            ReturnKind::Form => "form",
            ReturnKind::Essential => "essential",
        }
    }
}

impl FromStr for ReturnKind {
    type Err = DataHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ReturnKind::All),
            "form" => Ok(ReturnKind::Form),
            "essential" => Ok(ReturnKind::Essential),
            other => Err(DataHelperError::ConfigError(format!(
                "unknown return kind `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `column <operator> value` condition checked by `DataHelper::verify_within`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyExpression {
    /// Name of the table column
    pub name: String,
    /// Value compared against the column
    #[serde(default = "null_value")]
    pub value: SqlValue,
    /// Comparison operator; empty means `=`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator: String,
}

fn null_value() -> SqlValue {
    SqlValue::Null
}

impl VerifyExpression {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<SqlValue>, operator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            operator: operator.into(),
        }
    }

    /// Shorthand for an equality check.
    #[must_use]
    pub fn eq(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(name, value, "=")
    }
}
