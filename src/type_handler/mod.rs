//! Type adapters: per-runtime-type conversion between caller values and driver values.
//!
//! The binder looks an adapter up by the parameter value's [`TypeKey`]; result mappings look one
//! up by the key declared on the mapping. Registration happens while building the
//! configuration, lookups afterwards only read.

mod builtin;
mod enums;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use builtin::{
    BlobAdapter, BoolAdapter, DateAdapter, FloatAdapter, IntAdapter, JsonAdapter, TextAdapter,
    TimeAdapter, TimestampAdapter,
};
pub use enums::{EnumAdapter, EnumEncoding};

use crate::error::SqlMapperError;
use crate::types::{DbValue, SqlType, SqlValue, TypeKey};

/// Converts one runtime type to and from its driver representation.
pub trait TypeAdapter: Send + Sync + fmt::Debug {
    /// Convert a non-null parameter value for binding.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` when the value is not of the adapter's type.
    fn bind_parameter(
        &self,
        value: &SqlValue,
        sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError>;

    /// Convert a non-null column value read from a row.
    ///
    /// # Errors
    /// Returns `SqlMapperError::MappingError` when the driver value cannot be converted.
    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError>;
}

#[derive(Debug, Clone, Default)]
pub struct TypeAdapterRegistry {
    adapters: HashMap<TypeKey, Arc<dyn TypeAdapter>>,
}

impl TypeAdapterRegistry {
    /// An empty registry; every value is bound raw.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with adapters for every built-in value type.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TypeKey::Bool, BoolAdapter);
        registry.register(TypeKey::Int, IntAdapter);
        registry.register(TypeKey::Float, FloatAdapter);
        registry.register(TypeKey::Text, TextAdapter);
        registry.register(TypeKey::Blob, BlobAdapter);
        registry.register(TypeKey::Timestamp, TimestampAdapter);
        registry.register(TypeKey::Date, DateAdapter);
        registry.register(TypeKey::Time, TimeAdapter);
        registry.register(TypeKey::Json, JsonAdapter);
        registry
    }

    /// Register (or replace) the adapter for `key`.
    pub fn register(&mut self, key: TypeKey, adapter: impl TypeAdapter + 'static) {
        self.adapters.insert(key, Arc::new(adapter));
    }

    pub fn register_enum(&mut self, adapter: EnumAdapter) {
        let key = TypeKey::Enum(adapter.type_name().to_string());
        self.register(key, adapter);
    }

    #[must_use]
    pub fn has_adapter(&self, key: &TypeKey) -> bool {
        self.adapters.contains_key(key)
    }

    #[must_use]
    pub fn adapter_for(&self, key: &TypeKey) -> Option<&Arc<dyn TypeAdapter>> {
        self.adapters.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.adapters.keys()
    }

    /// Read a column value, through the adapter for `key` when one is registered.
    ///
    /// # Errors
    /// Propagates the adapter's conversion failure.
    pub fn read(&self, key: Option<&TypeKey>, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        match key.and_then(|key| self.adapter_for(key)) {
            Some(adapter) => adapter.read_result(value),
            None => Ok(SqlValue::from(value)),
        }
    }
}

pub(crate) fn unexpected_parameter(expected: &str, value: &SqlValue) -> SqlMapperError {
    SqlMapperError::ParameterError(format!("expected a {expected} value, got {value:?}"))
}

pub(crate) fn unreadable(expected: &str, value: &DbValue) -> SqlMapperError {
    SqlMapperError::MappingError(format!(
        "cannot read a {expected} from a {} column value {value:?}",
        value.type_name()
    ))
}
