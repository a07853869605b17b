use std::error::Error;
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use tokio_postgres::types::{FromSql, Type};

use crate::error::DataHelperError;
use crate::results::{Column, ResultSet, ScanType};
use crate::types::SqlValue;

type BoxError = Box<dyn Error + Sync + Send>;

/// `NUMERIC` in its exact decimal text form.
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        numeric_to_string(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Undecoded wire bytes of any type.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Render the binary `NUMERIC` format: a header of digit count, weight, sign and
/// display scale, then base-10000 digits.
#[allow(clippy::cast_possible_wrap)]
fn numeric_to_string(raw: &[u8]) -> Result<String, BoxError> {
    let read = |idx: usize| -> Result<u16, BoxError> {
        raw.get(idx..idx + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };
    let ndigits = usize::from(read(0)?);
    let weight = i32::from(read(2)? as i16);
    let sign = read(4)?;
    let dscale = usize::from(read(6)?);
    match sign {
        0xC000 => return Ok("NaN".into()),
        0xD000 => return Ok("Infinity".into()),
        0xF000 => return Ok("-Infinity".into()),
        _ => {}
    }
    let digits = (0..ndigits)
        .map(|i| read(8 + 2 * i))
        .collect::<Result<Vec<u16>, _>>()?;
    let digit_at = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                write!(out, "{}", digit_at(i))?;
            } else {
                write!(out, "{:04}", digit_at(i))?;
            }
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            write!(frac, "{:04}", digit_at(i))?;
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

/// Scan type a column of Postgres type `ty` decodes into.
#[must_use]
pub fn scan_type_for(ty: &Type) -> ScanType {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => ScanType::Int,
        Type::FLOAT4 | Type::FLOAT8 => ScanType::Float,
        Type::BOOL => ScanType::Bool,
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => ScanType::Timestamp,
        Type::JSON | Type::JSONB => ScanType::Json,
        Type::BYTEA => ScanType::Blob,
        Type::TEXT
        | Type::VARCHAR
        | Type::BPCHAR
        | Type::NAME
        | Type::NUMERIC
        | Type::UUID
        | Type::TIME => ScanType::Text,
        _ => ScanType::Unknown,
    }
}

/// Extracts a `SqlValue` from a `tokio_postgres` Row at the given index.
///
/// Types without a natural `SqlValue` form come back as their raw wire bytes.
///
/// # Errors
/// Returns `DataHelperError` if the column cannot be retrieved.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<SqlValue, DataHelperError> {
    let type_info = row.columns()[idx].type_().clone();
    let value = match type_info {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(SqlValue::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| SqlValue::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| SqlValue::Timestamp(v.and_time(NaiveTime::MIN))),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|v| SqlValue::Text(v.to_string())),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<JsonValue>>(idx)?.map(SqlValue::Json),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Blob),
        Type::NUMERIC => row
            .try_get::<_, Option<PgNumeric>>(idx)?
            .map(|v| SqlValue::Text(v.0)),
        Type::UUID => match row.try_get::<_, Option<RawValue>>(idx)? {
            Some(raw) => Some(SqlValue::Text(
                uuid::Uuid::from_slice(&raw.0)
                    .map_err(|e| DataHelperError::ExecutionError(format!("invalid uuid: {e}")))?
                    .to_string(),
            )),
            None => None,
        },
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        }
        _ => row
            .try_get::<_, Option<RawValue>>(idx)?
            .map(|v| SqlValue::Blob(v.0)),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// Buffer `rows` into a result set described by the statement's `columns`.
///
/// # Errors
/// Returns errors from result processing.
pub fn build_result_set(
    columns: &[tokio_postgres::Column],
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, DataHelperError> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_columns(
        columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name(),
                    c.type_().name().to_ascii_uppercase(),
                    scan_type_for(c.type_()),
                )
            })
            .collect(),
    );

    for row in rows {
        let mut row_values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values)?;
    }
    Ok(result_set)
}
