use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::Value as JsonValue;

use super::{TypeAdapter, unexpected_parameter, unreadable};
use crate::error::SqlMapperError;
use crate::types::{DbValue, SqlType, SqlValue, parse_timestamp};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, Default)]
pub struct BoolAdapter;

impl TypeAdapter for BoolAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Bool(b) => Ok(DbValue::Bool(*b)),
            other => Err(unexpected_parameter("boolean", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Bool(b) => Ok(SqlValue::Bool(b)),
            DbValue::Int(0) => Ok(SqlValue::Bool(false)),
            DbValue::Int(1) => Ok(SqlValue::Bool(true)),
            DbValue::Text(ref s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(SqlValue::Bool(true)),
                "false" | "f" | "0" => Ok(SqlValue::Bool(false)),
                _ => Err(unreadable("boolean", &value)),
            },
            other => Err(unreadable("boolean", &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntAdapter;

impl TypeAdapter for IntAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Int(i) => Ok(DbValue::Int(*i)),
            other => Err(unexpected_parameter("integer", other)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Int(i) => Ok(SqlValue::Int(i)),
            DbValue::Bool(b) => Ok(SqlValue::Int(i64::from(b))),
            DbValue::Float(f) if f.fract() == 0.0 => Ok(SqlValue::Int(f as i64)),
            DbValue::Text(ref s) => s
                .trim()
                .parse()
                .map(SqlValue::Int)
                .map_err(|_| unreadable("integer", &value)),
            other => Err(unreadable("integer", &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FloatAdapter;

impl TypeAdapter for FloatAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Float(f) => Ok(DbValue::Float(*f)),
            other => Err(unexpected_parameter("float", other)),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Float(f) => Ok(SqlValue::Float(f)),
            DbValue::Int(i) => Ok(SqlValue::Float(i as f64)),
            DbValue::Text(ref s) => s
                .trim()
                .parse()
                .map(SqlValue::Float)
                .map_err(|_| unreadable("float", &value)),
            other => Err(unreadable("float", &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextAdapter;

impl TypeAdapter for TextAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Text(s) => Ok(DbValue::Text(s.clone())),
            other => Err(unexpected_parameter("text", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Text(s) => Ok(SqlValue::Text(s)),
            DbValue::Int(i) => Ok(SqlValue::Text(i.to_string())),
            DbValue::Float(f) => Ok(SqlValue::Text(f.to_string())),
            DbValue::Bool(b) => Ok(SqlValue::Text(b.to_string())),
            DbValue::Timestamp(ts) => Ok(SqlValue::Text(ts.to_string())),
            DbValue::Blob(bytes) => String::from_utf8(bytes)
                .map(SqlValue::Text)
                .map_err(|e| SqlMapperError::MappingError(format!("blob is not utf-8 text: {e}"))),
            DbValue::Null => Ok(SqlValue::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlobAdapter;

impl TypeAdapter for BlobAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Blob(bytes) => Ok(DbValue::Blob(bytes.clone())),
            other => Err(unexpected_parameter("byte array", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Blob(bytes) => Ok(SqlValue::Blob(bytes)),
            DbValue::Text(s) => Ok(SqlValue::Blob(s.into_bytes())),
            other => Err(unreadable("byte array", &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampAdapter;

impl TypeAdapter for TimestampAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Timestamp(ts) => Ok(DbValue::Timestamp(*ts)),
            other => Err(unexpected_parameter("timestamp", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Timestamp(ts) => Ok(SqlValue::Timestamp(ts)),
            DbValue::Text(ref s) => parse_timestamp(s)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| unreadable("timestamp", &value)),
            DbValue::Int(secs) => DateTime::from_timestamp(secs, 0)
                .map(|dt| SqlValue::Timestamp(dt.naive_utc()))
                .ok_or_else(|| unreadable("timestamp", &value)),
            other => Err(unreadable("timestamp", &other)),
        }
    }
}

/// Dates travel as `YYYY-MM-DD` text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateAdapter;

impl TypeAdapter for DateAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Date(date) => Ok(DbValue::Text(date.format(DATE_FORMAT).to_string())),
            other => Err(unexpected_parameter("date", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Timestamp(ts) => Ok(SqlValue::Date(ts.date())),
            DbValue::Text(ref s) => {
                let head = s.get(..10).unwrap_or(s);
                NaiveDate::parse_from_str(head, DATE_FORMAT)
                    .map(SqlValue::Date)
                    .map_err(|_| unreadable("date", &value))
            }
            other => Err(unreadable("date", &other)),
        }
    }
}

/// Times of day travel as `HH:MM:SS[.fff]` text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeAdapter;

impl TypeAdapter for TimeAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Time(time) => Ok(DbValue::Text(time.format(TIME_FORMAT).to_string())),
            other => Err(unexpected_parameter("time", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Timestamp(ts) => Ok(SqlValue::Time(ts.time())),
            DbValue::Text(ref s) => NaiveTime::parse_from_str(s, TIME_FORMAT)
                .map(SqlValue::Time)
                .map_err(|_| unreadable("time", &value)),
            other => Err(unreadable("time", &other)),
        }
    }
}

/// JSON documents travel as serialized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl TypeAdapter for JsonAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        match value {
            SqlValue::Json(json) => Ok(DbValue::Text(serde_json::to_string(json)?)),
            other => Err(unexpected_parameter("json", other)),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        match value {
            DbValue::Text(s) => Ok(SqlValue::Json(serde_json::from_str(&s)?)),
            DbValue::Blob(bytes) => Ok(SqlValue::Json(serde_json::from_slice(&bytes)?)),
            DbValue::Int(i) => Ok(SqlValue::Json(JsonValue::from(i))),
            DbValue::Float(f) => Ok(SqlValue::Json(JsonValue::from(f))),
            DbValue::Bool(b) => Ok(SqlValue::Json(JsonValue::from(b))),
            other => Err(unreadable("json", &other)),
        }
    }
}
