use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;

/// Values carried by parameter objects and mapped records.
///
/// This is the caller-facing value model. Drivers only understand the narrower [`DbValue`];
/// the types without a direct driver representation (dates, times, JSON, enums) cross that
/// boundary through a registered type adapter:
/// ```rust
/// use reactive_sql_mapper::prelude::*;
///
/// let params = Record::new()
///     .with("id", 1)
///     .with("name", "alice")
///     .with("status", SqlValue::enumeration("Status", "ACTIVE"));
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
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
    /// Binary data
    Blob(Vec<u8>),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// JSON document
    Json(JsonValue),
    /// Constant of a named enumeration
    Enum(EnumValue),
}

/// A constant of a user enumeration, identified by type name and variant name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: String,
    pub variant: String,
}

impl SqlValue {
    #[must_use]
    pub fn enumeration(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        SqlValue::Enum(EnumValue {
            type_name: type_name.into(),
            variant: variant.into(),
        })
    }

    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type of the value, used to pick a type adapter. `None` for NULL.
    #[must_use]
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(_) => Some(TypeKey::Bool),
            SqlValue::Int(_) => Some(TypeKey::Int),
            SqlValue::Float(_) => Some(TypeKey::Float),
            SqlValue::Text(_) => Some(TypeKey::Text),
            SqlValue::Blob(_) => Some(TypeKey::Blob),
            SqlValue::Timestamp(_) => Some(TypeKey::Timestamp),
            SqlValue::Date(_) => Some(TypeKey::Date),
            SqlValue::Time(_) => Some(TypeKey::Time),
            SqlValue::Json(_) => Some(TypeKey::Json),
            SqlValue::Enum(value) => Some(TypeKey::Enum(value.type_name.clone())),
        }
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

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
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
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            return parse_timestamp(s);
        }
        None
    }

    /// Driver-level representation when one exists without an adapter.
    pub(crate) fn to_raw(&self) -> Option<DbValue> {
        match self {
            SqlValue::Null => Some(DbValue::Null),
            SqlValue::Bool(b) => Some(DbValue::Bool(*b)),
            SqlValue::Int(i) => Some(DbValue::Int(*i)),
            SqlValue::Float(f) => Some(DbValue::Float(*f)),
            SqlValue::Text(s) => Some(DbValue::Text(s.clone())),
            SqlValue::Blob(b) => Some(DbValue::Blob(b.clone())),
            SqlValue::Timestamp(ts) => Some(DbValue::Timestamp(*ts)),
            SqlValue::Date(_) | SqlValue::Time(_) | SqlValue::Json(_) | SqlValue::Enum(_) => None,
        }
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    // Try "YYYY-MM-DD HH:MM:SS"
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    // Try "YYYY-MM-DD HH:MM:SS.SSS"
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

impl From<DbValue> for SqlValue {
    fn from(value: DbValue) -> Self {
        match value {
            DbValue::Null => SqlValue::Null,
            DbValue::Bool(b) => SqlValue::Bool(b),
            DbValue::Int(i) => SqlValue::Int(i),
            DbValue::Float(f) => SqlValue::Float(f),
            DbValue::Text(s) => SqlValue::Text(s),
            DbValue::Blob(b) => SqlValue::Blob(b),
            DbValue::Timestamp(ts) => SqlValue::Timestamp(ts),
        }
    }
}

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

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(value: NaiveTime) -> Self {
        SqlValue::Time(value)
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

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Int(i) => serializer.serialize_i64(*i),
            SqlValue::Float(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(bytes) => bytes.serialize(serializer),
            SqlValue::Timestamp(ts) => ts.serialize(serializer),
            SqlValue::Date(date) => date.serialize(serializer),
            SqlValue::Time(time) => time.serialize(serializer),
            SqlValue::Json(json) => json.serialize(serializer),
            SqlValue::Enum(value) => serializer.serialize_str(&value.variant),
        }
    }
}

/// Values a driver can send and receive without any adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl DbValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            DbValue::Null => "Null",
            DbValue::Bool(_) => "Bool",
            DbValue::Int(_) => "Int",
            DbValue::Float(_) => "Float",
            DbValue::Text(_) => "Text",
            DbValue::Blob(_) => "Blob",
            DbValue::Timestamp(_) => "Timestamp",
        }
    }
}

/// Runtime type identity used to look up type adapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Bool,
    Int,
    Float,
    Text,
    Blob,
    Timestamp,
    Date,
    Time,
    Json,
    /// A user enumeration, keyed by its type name
    Enum(String),
}

impl TypeKey {
    /// Parse a type key as written in a placeholder or result mapping (`int`, `enum:Status`, ...).
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for unknown names.
    pub fn parse(name: &str) -> Result<Self, SqlMapperError> {
        let lower = name.trim().to_ascii_lowercase();
        if let Some((prefix, type_name)) = name.trim().split_once(':')
            && prefix.eq_ignore_ascii_case("enum")
        {
            return Ok(TypeKey::Enum(type_name.to_string()));
        }
        match lower.as_str() {
            "bool" | "boolean" => Ok(TypeKey::Bool),
            "int" | "integer" | "long" | "i64" => Ok(TypeKey::Int),
            "float" | "double" | "f64" => Ok(TypeKey::Float),
            "text" | "string" => Ok(TypeKey::Text),
            "blob" | "bytes" => Ok(TypeKey::Blob),
            "timestamp" | "datetime" => Ok(TypeKey::Timestamp),
            "date" => Ok(TypeKey::Date),
            "time" => Ok(TypeKey::Time),
            "json" => Ok(TypeKey::Json),
            _ => Err(SqlMapperError::ConfigError(format!(
                "unknown type key '{name}'"
            ))),
        }
    }
}

/// Declared SQL type of a parameter, used for typed NULLs and OUT placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    /// Driver chooses the type
    Other,
    Null,
    Boolean,
    Integer,
    #[value(name = "bigint")]
    #[serde(rename = "BIGINT")]
    BigInt,
    Double,
    Varchar,
    Blob,
    Timestamp,
    Date,
    Time,
    Json,
}

impl SqlType {
    /// Parse a case-insensitive SQL type name such as `INTEGER` or `varchar`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for unknown names.
    pub fn parse(name: &str) -> Result<Self, SqlMapperError> {
        <SqlType as ValueEnum>::from_str(name.trim(), true)
            .map_err(|e| SqlMapperError::ConfigError(format!("unknown sql type '{name}': {e}")))
    }
}

/// Transaction isolation level applied when a session begins a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Direction of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    #[value(name = "inout")]
    InOut,
}
