use rusqlite::ToSql;
use rusqlite::types::Value;

use crate::types::{SqlValue, TIMESTAMP_FORMAT};

/// Convert a single `SqlValue` to a rusqlite `Value`.
///
/// `SQLite` has no boolean, timestamp or JSON storage class: booleans bind as 0/1,
/// timestamps and JSON as text.
#[must_use]
pub fn sql_value_to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        SqlValue::Json(json) => Value::Text(json.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Owned `SQLite` parameters, movable into a blocking task.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[SqlValue]) -> Self {
        Params(params.iter().map(sql_value_to_sqlite_value).collect())
    }

    /// Build a borrowed params slice suitable for rusqlite execution.
    #[must_use]
    pub fn as_refs(&self) -> Vec<&dyn ToSql> {
        self.0.iter().map(|v| v as &dyn ToSql).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn values_map_onto_storage_classes() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 250)
            .unwrap();
        let params = Params::convert(&[
            SqlValue::Bool(true),
            SqlValue::Timestamp(ts),
            SqlValue::Json(json!({"a": 1})),
            SqlValue::Null,
        ]);
        assert_eq!(
            params.0,
            vec![
                Value::Integer(1),
                Value::Text("2024-05-01 08:30:00.250".into()),
                Value::Text(r#"{"a":1}"#.into()),
                Value::Null,
            ]
        );
        assert_eq!(params.as_refs().len(), 4);
    }
}
