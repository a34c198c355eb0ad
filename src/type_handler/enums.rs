use super::{TypeAdapter, unexpected_parameter, unreadable};
use crate::error::SqlMapperError;
use crate::types::{DbValue, SqlType, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumEncoding {
    /// Stored as the zero-based position of the variant
    Ordinal,
    /// Stored as the variant name
    Name,
}

/// Adapter for one named enumeration.
///
/// ```rust
/// use reactive_sql_mapper::prelude::*;
///
/// let status = EnumAdapter::ordinal("Status", ["DRAFT", "ACTIVE", "ARCHIVED"]);
/// let bound = status.bind_parameter(&SqlValue::enumeration("Status", "ACTIVE"), None)?;
/// assert_eq!(bound, DbValue::Int(1));
/// # Ok::<(), SqlMapperError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EnumAdapter {
    type_name: String,
    variants: Vec<String>,
    encoding: EnumEncoding,
}

impl EnumAdapter {
    #[must_use]
    pub fn new<I>(type_name: impl Into<String>, variants: I, encoding: EnumEncoding) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
            encoding,
        }
    }

    #[must_use]
    pub fn ordinal<I>(type_name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::new(type_name, variants, EnumEncoding::Ordinal)
    }

    #[must_use]
    pub fn by_name<I>(type_name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::new(type_name, variants, EnumEncoding::Name)
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn constant(&self, variant: &str) -> SqlValue {
        SqlValue::enumeration(self.type_name.clone(), variant)
    }
}

impl TypeAdapter for EnumAdapter {
    fn bind_parameter(
        &self,
        value: &SqlValue,
        _sql_type: Option<SqlType>,
    ) -> Result<DbValue, SqlMapperError> {
        let SqlValue::Enum(constant) = value else {
            return Err(unexpected_parameter(&self.type_name, value));
        };
        if constant.type_name != self.type_name {
            return Err(unexpected_parameter(&self.type_name, value));
        }
        let ordinal = self
            .variants
            .iter()
            .position(|v| *v == constant.variant)
            .ok_or_else(|| {
                SqlMapperError::ParameterError(format!(
                    "'{}' is not a constant of enum {}",
                    constant.variant, self.type_name
                ))
            })?;
        match self.encoding {
            EnumEncoding::Ordinal => i64::try_from(ordinal)
                .map(DbValue::Int)
                .map_err(|e| SqlMapperError::ParameterError(format!("ordinal overflow: {e}"))),
            EnumEncoding::Name => Ok(DbValue::Text(constant.variant.clone())),
        }
    }

    fn read_result(&self, value: DbValue) -> Result<SqlValue, SqlMapperError> {
        let found = match (&self.encoding, &value) {
            (EnumEncoding::Ordinal, DbValue::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|idx| self.variants.get(idx)),
            (EnumEncoding::Name, DbValue::Text(name)) => self.variants.iter().find(|v| *v == name),
            _ => None,
        };
        found
            .map(|variant| self.constant(variant))
            .ok_or_else(|| unreadable(&format!("constant of enum {}", self.type_name), &value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trip() {
        let adapter = EnumAdapter::ordinal("Status", ["DRAFT", "ACTIVE"]);
        let value = SqlValue::enumeration("Status", "ACTIVE");
        let bound = adapter.bind_parameter(&value, None).unwrap();
        assert_eq!(bound, DbValue::Int(1));
        assert_eq!(adapter.read_result(bound).unwrap(), value);
    }

    #[test]
    fn rejects_foreign_and_unknown_constants() {
        let adapter = EnumAdapter::by_name("Status", ["DRAFT", "ACTIVE"]);
        assert!(
            adapter
                .bind_parameter(&SqlValue::enumeration("Color", "ACTIVE"), None)
                .is_err()
        );
        assert!(
            adapter
                .bind_parameter(&SqlValue::enumeration("Status", "GONE"), None)
                .is_err()
        );
        assert!(adapter.read_result(DbValue::Text("GONE".into())).is_err());
        assert!(adapter.read_result(DbValue::Int(0)).is_err());
    }
}
