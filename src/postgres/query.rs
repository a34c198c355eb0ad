use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

use crate::error::SqlMapperError;
use crate::types::DbValue;

/// Extracts a `DbValue` from a `tokio_postgres` Row at the given index.
///
/// Dates, times and JSON come back as text; the date, time and JSON type adapters read them.
///
/// # Errors
/// Returns `SqlMapperError` if the column cannot be retrieved.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<DbValue, SqlMapperError> {
    let type_info = row.columns()[idx].type_();

    match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| DbValue::Int(i64::from(v))))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| DbValue::Int(i64::from(v))))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, DbValue::Int))
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| DbValue::Float(f64::from(v))))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, DbValue::Float))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, DbValue::Bool))
        }
        "timestamp" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, DbValue::Timestamp))
        }
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| DbValue::Timestamp(v.naive_utc())))
        }
        "date" => {
            let val: Option<NaiveDate> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| {
                DbValue::Text(v.format("%Y-%m-%d").to_string())
            }))
        }
        "time" => {
            let val: Option<NaiveTime> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| {
                DbValue::Text(v.format("%H:%M:%S%.f").to_string())
            }))
        }
        "json" | "jsonb" => {
            let val: Option<Value> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, |v| DbValue::Text(v.to_string())))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, DbValue::Blob))
        }
        _ => {
            // For other types, attempt to get as string
            let val: Option<String> = row.try_get(idx)?;
            Ok(val.map_or(DbValue::Null, DbValue::Text))
        }
    }
}
