use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SqlMapperError;
use crate::types::{ParameterMode, SqlType, SqlValue, TypeKey};

lazy_static! {
    static ref ATTRIBUTE: Regex =
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_]*)\s*=\s*(\S(?:.*\S)?)\s*$").expect("valid regex");
}

/// How one placeholder of a statement is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMapping {
    /// Property path on the parameter object (`id`, `author.name`)
    pub property: String,
    pub mode: ParameterMode,
    /// Declared SQL type, used for typed NULLs and OUT placeholders
    pub sql_type: Option<SqlType>,
    /// Forces a specific type adapter instead of the value's runtime type
    pub type_key: Option<TypeKey>,
}

impl ParameterMapping {
    #[must_use]
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mode: ParameterMode::In,
            sql_type: None,
            type_key: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    #[must_use]
    pub fn with_type_key(mut self, type_key: TypeKey) -> Self {
        self.type_key = Some(type_key);
        self
    }

    /// Parse the inside of a `#{...}` placeholder:
    /// `property[, sqlType=INTEGER][, mode=OUT][, typeKey=enum:Status]`.
    /// `jdbcType` and `javaType` are accepted as aliases.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an empty property or unknown attribute.
    pub fn parse(content: &str) -> Result<Self, SqlMapperError> {
        let mut parts = content.split(',');
        let property = parts.next().map(str::trim).unwrap_or_default();
        if property.is_empty() {
            return Err(SqlMapperError::ConfigError(format!(
                "placeholder '#{{{content}}}' has no property"
            )));
        }
        let mut mapping = ParameterMapping::new(property);
        for part in parts {
            let captures = ATTRIBUTE.captures(part).ok_or_else(|| {
                SqlMapperError::ConfigError(format!(
                    "malformed attribute '{part}' in placeholder '#{{{content}}}'"
                ))
            })?;
            let value = &captures[2];
            match &captures[1] {
                "sqlType" | "jdbcType" => mapping.sql_type = Some(SqlType::parse(value)?),
                "typeKey" | "javaType" => mapping.type_key = Some(TypeKey::parse(value)?),
                "mode" => {
                    mapping.mode = <ParameterMode as ValueEnum>::from_str(value, true)
                        .map_err(|e| {
                            SqlMapperError::ConfigError(format!("unknown mode '{value}': {e}"))
                        })?;
                }
                other => {
                    return Err(SqlMapperError::ConfigError(format!(
                        "unknown placeholder attribute '{other}' in '#{{{content}}}'"
                    )));
                }
            }
        }
        Ok(mapping)
    }
}

impl fmt::Display for ParameterMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterMapping{{property='{}', mode={:?}", self.property, self.mode)?;
        if let Some(sql_type) = self.sql_type {
            write!(f, ", sqlType={sql_type:?}")?;
        }
        if let Some(type_key) = &self.type_key {
            write!(f, ", typeKey={type_key:?}")?;
        }
        f.write_str("}")
    }
}

/// SQL ready for a driver plus everything the binder needs to fill it.
#[derive(Debug, Clone, Default)]
pub struct BoundSql {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
    additional_parameters: BTreeMap<String, SqlValue>,
}

impl BoundSql {
    #[must_use]
    pub fn new(sql: String, parameter_mappings: Vec<ParameterMapping>) -> Self {
        Self {
            sql,
            parameter_mappings,
            additional_parameters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    /// Values computed while building the SQL; they shadow the parameter object.
    #[must_use]
    pub fn additional_parameter(&self, name: &str) -> Option<&SqlValue> {
        self.additional_parameters.get(name)
    }

    pub fn set_additional_parameter(&mut self, name: impl Into<String>, value: SqlValue) {
        self.additional_parameters.insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_property() {
        let mapping = ParameterMapping::parse(" author.id ").unwrap();
        assert_eq!(mapping, ParameterMapping::new("author.id"));
    }

    #[test]
    fn parses_attributes() {
        let mapping =
            ParameterMapping::parse("status, typeKey=enum:Status, mode=inout, sqlType=integer")
                .unwrap();
        assert_eq!(mapping.type_key, Some(TypeKey::Enum("Status".into())));
        assert_eq!(mapping.mode, ParameterMode::InOut);
        assert_eq!(mapping.sql_type, Some(SqlType::Integer));
    }

    #[test]
    fn rejects_unknown_attributes() {
        assert!(ParameterMapping::parse("id, scale=2").is_err());
        assert!(ParameterMapping::parse(", sqlType=INTEGER").is_err());
        assert!(ParameterMapping::parse("id, sqlType").is_err());
    }

    #[test]
    fn display_describes_the_mapping() {
        let mapping = ParameterMapping::new("id").with_sql_type(SqlType::Integer);
        assert_eq!(
            mapping.to_string(),
            "ParameterMapping{property='id', mode=In, sqlType=Integer}"
        );
    }
}
