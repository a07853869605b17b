use rusqlite::Statement;
use rusqlite::types::Value;
use serde_json::Value as JsonValue;

use crate::error::DataHelperError;
use crate::results::{Column, ResultSet, ScanType};
use crate::types::SqlValue;

use super::params::Params;

/// Map a declared column type onto a scan type using `SQLite`'s affinity rules, with
/// the common boolean, date and JSON spellings recognised on top.
#[must_use]
pub fn scan_type_for_decltype(decl_type: Option<&str>) -> ScanType {
    let Some(decl) = decl_type else {
        return ScanType::Unknown;
    };
    let decl = decl.to_ascii_uppercase();
    if decl.contains("INT") {
        ScanType::Int
    } else if decl.contains("BOOL") {
        ScanType::Bool
    } else if decl.contains("JSON") {
        ScanType::Json
    } else if decl.contains("DATE") || decl.contains("TIME") {
        ScanType::Timestamp
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        ScanType::Text
    } else if decl.contains("BLOB") {
        ScanType::Blob
    } else if decl.contains("REAL")
        || decl.contains("FLOA")
        || decl.contains("DOUB")
        || decl.contains("NUMERIC")
        || decl.contains("DECIMAL")
    {
        ScanType::Float
    } else {
        ScanType::Unknown
    }
}

/// Decode a stored value, using the column's declared type to recover booleans,
/// timestamps and JSON stored as integers or text.
#[must_use]
pub fn sqlite_value_to_sql_value(value: Value, scan_type: ScanType) -> SqlValue {
    match (value, scan_type) {
        (Value::Null, _) => SqlValue::Null,
        (Value::Integer(i), ScanType::Bool) if i == 0 || i == 1 => SqlValue::Bool(i == 1),
        (Value::Integer(i), ScanType::Float) => {
            #[allow(clippy::cast_precision_loss)]
            let f = i as f64;
            SqlValue::Float(f)
        }
        (Value::Integer(i), _) => SqlValue::Int(i),
        (Value::Real(f), _) => SqlValue::Float(f),
        (Value::Text(s), ScanType::Timestamp) => {
            let text = SqlValue::Text(s);
            match text.as_timestamp() {
                Some(ts) => SqlValue::Timestamp(ts),
                None => text,
            }
        }
        (Value::Text(s), ScanType::Json) => match serde_json::from_str::<JsonValue>(&s) {
            Ok(json) => SqlValue::Json(json),
            Err(_) => SqlValue::Text(s),
        },
        (Value::Text(s), _) => SqlValue::Text(s),
        (Value::Blob(b), _) => SqlValue::Blob(b),
    }
}

/// Run `stmt` and buffer every row.
///
/// # Errors
/// Returns the `rusqlite` error raised while stepping the statement.
pub fn build_result_set(stmt: &mut Statement<'_>, params: &Params) -> Result<ResultSet, DataHelperError> {
    let columns: Vec<Column> = stmt
        .columns()
        .iter()
        .map(|c| {
            let decl = c.decl_type();
            Column::new(
                c.name(),
                decl.map(str::to_ascii_uppercase).unwrap_or_default(),
                scan_type_for_decltype(decl),
            )
        })
        .collect();
    let scan_types: Vec<ScanType> = columns.iter().map(Column::scan_type).collect();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_columns(columns);

    let param_refs = params.as_refs();
    let mut rows = stmt.query(&param_refs[..])?;
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(scan_types.len());
        for (idx, scan_type) in scan_types.iter().enumerate() {
            let value: Value = row.get(idx)?;
            row_values.push(sqlite_value_to_sql_value(value, *scan_type));
        }
        result_set.add_row_values(row_values)?;
    }
    result_set.refine_scan_types();
    Ok(result_set)
}
