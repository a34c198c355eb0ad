//! Mapped statement descriptors.
//!
//! The descriptor format (XML, annotations, code generation) lives outside this crate; the
//! executor only reads descriptors through [`StatementProvider`] and [`SqlSource`].

mod parameter;
mod result_map;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use parameter::{BoundSql, ParameterMapping};
pub use result_map::{NestedKind, NestedResultMapping, ResultMap, ResultMapping};

use crate::error::SqlMapperError;
use crate::record::ParameterObject;
use crate::translation::{PlaceholderStyle, compile_template};

/// Produces the SQL for one execution of a statement.
pub trait SqlSource: Send + Sync + fmt::Debug {
    /// Resolve the SQL and parameter mappings for `parameter`.
    ///
    /// # Errors
    /// Implementations may fail when the parameter cannot produce valid SQL.
    fn bound_sql(&self, parameter: &ParameterObject) -> Result<BoundSql, SqlMapperError>;
}

/// SQL fixed at registration time.
#[derive(Debug, Clone)]
pub struct StaticSqlSource {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
}

impl StaticSqlSource {
    #[must_use]
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<ParameterMapping>) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings,
        }
    }

    /// Compile a `#{...}` template for the given placeholder style.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the template is malformed.
    pub fn from_template(template: &str, style: PlaceholderStyle) -> Result<Self, SqlMapperError> {
        let (sql, parameter_mappings) = compile_template(template, style)?;
        Ok(Self::new(sql, parameter_mappings))
    }
}

impl SqlSource for StaticSqlSource {
    fn bound_sql(&self, _parameter: &ParameterObject) -> Result<BoundSql, SqlMapperError> {
        Ok(BoundSql::new(
            self.sql.clone(),
            self.parameter_mappings.clone(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlCommand {
    Select,
    Insert,
    Update,
    Delete,
}

impl SqlCommand {
    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(self, SqlCommand::Select)
    }
}

/// Generated-key retrieval for inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGeneration {
    /// Properties written back on the parameter object
    pub key_properties: Vec<String>,
    /// Columns the driver returns, positionally matching `key_properties`
    pub key_columns: Vec<String>,
}

#[derive(Debug)]
pub struct MappedStatement {
    id: String,
    command: SqlCommand,
    sql_source: Arc<dyn SqlSource>,
    result_map: Option<Arc<ResultMap>>,
    key_generation: Option<KeyGeneration>,
    result_ordered: bool,
}

impl MappedStatement {
    #[must_use]
    pub fn select(id: impl Into<String>, template: impl Into<String>) -> MappedStatementBuilder {
        MappedStatementBuilder::new(id, SqlCommand::Select, template)
    }

    #[must_use]
    pub fn insert(id: impl Into<String>, template: impl Into<String>) -> MappedStatementBuilder {
        MappedStatementBuilder::new(id, SqlCommand::Insert, template)
    }

    #[must_use]
    pub fn update(id: impl Into<String>, template: impl Into<String>) -> MappedStatementBuilder {
        MappedStatementBuilder::new(id, SqlCommand::Update, template)
    }

    #[must_use]
    pub fn delete(id: impl Into<String>, template: impl Into<String>) -> MappedStatementBuilder {
        MappedStatementBuilder::new(id, SqlCommand::Delete, template)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn command(&self) -> SqlCommand {
        self.command
    }

    #[must_use]
    pub fn sql_source(&self) -> &Arc<dyn SqlSource> {
        &self.sql_source
    }

    #[must_use]
    pub fn result_map(&self) -> Option<&Arc<ResultMap>> {
        self.result_map.as_ref()
    }

    #[must_use]
    pub fn key_generation(&self) -> Option<&KeyGeneration> {
        self.key_generation.as_ref()
    }

    /// Rows of one grouped result arrive contiguously.
    #[must_use]
    pub fn result_ordered(&self) -> bool {
        self.result_ordered
    }
}

enum SourceSpec {
    Template(String),
    Custom(Arc<dyn SqlSource>),
}

/// Fluent builder for [`MappedStatement`]; templates are compiled when the configuration knows
/// the driver's placeholder style.
pub struct MappedStatementBuilder {
    id: String,
    command: SqlCommand,
    source: SourceSpec,
    result_map: Option<Arc<ResultMap>>,
    key_generation: Option<KeyGeneration>,
    result_ordered: Option<bool>,
}

impl MappedStatementBuilder {
    fn new(id: impl Into<String>, command: SqlCommand, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command,
            source: SourceSpec::Template(template.into()),
            result_map: None,
            key_generation: None,
            result_ordered: None,
        }
    }

    /// Replace the template with a custom SQL source.
    #[must_use]
    pub fn sql_source(mut self, source: Arc<dyn SqlSource>) -> Self {
        self.source = SourceSpec::Custom(source);
        self
    }

    #[must_use]
    pub fn result_map(mut self, result_map: ResultMap) -> Self {
        self.result_map = Some(Arc::new(result_map));
        self
    }

    #[must_use]
    pub fn result_ordered(mut self, ordered: bool) -> Self {
        self.result_ordered = Some(ordered);
        self
    }

    /// Retrieve generated `columns` and write them to `properties` of the parameter object.
    #[must_use]
    pub fn generated_keys<P, C>(mut self, properties: P, columns: C) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.key_generation = Some(KeyGeneration {
            key_properties: properties.into_iter().map(Into::into).collect(),
            key_columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for a malformed template or inconsistent keys.
    pub fn build(
        self,
        style: PlaceholderStyle,
        default_ordered: bool,
    ) -> Result<MappedStatement, SqlMapperError> {
        if let Some(keys) = &self.key_generation
            && keys.key_properties.len() != keys.key_columns.len()
        {
            return Err(SqlMapperError::ConfigError(format!(
                "statement '{}' maps {} key properties to {} key columns",
                self.id,
                keys.key_properties.len(),
                keys.key_columns.len()
            )));
        }
        let sql_source: Arc<dyn SqlSource> = match self.source {
            SourceSpec::Template(template) => {
                Arc::new(StaticSqlSource::from_template(&template, style).map_err(|e| {
                    SqlMapperError::ConfigError(format!("statement '{}': {e}", self.id))
                })?)
            }
            SourceSpec::Custom(source) => source,
        };
        Ok(MappedStatement {
            id: self.id,
            command: self.command,
            sql_source,
            result_map: self.result_map,
            key_generation: self.key_generation,
            result_ordered: self.result_ordered.unwrap_or(default_ordered),
        })
    }
}

/// Looks up statements by id.
pub trait StatementProvider: Send + Sync {
    fn statement(&self, id: &str) -> Option<Arc<MappedStatement>>;
}

/// In-memory statement table filled while building a configuration.
#[derive(Debug, Default)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<MappedStatement>>,
}

impl StatementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when the id is already registered.
    pub fn register(&mut self, statement: MappedStatement) -> Result<(), SqlMapperError> {
        if self.statements.contains_key(statement.id()) {
            return Err(SqlMapperError::ConfigError(format!(
                "mapped statement '{}' is already registered",
                statement.id()
            )));
        }
        self.statements
            .insert(statement.id().to_string(), Arc::new(statement));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl StatementProvider for StatementRegistry {
    fn statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id).cloned()
    }
}
