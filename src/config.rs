use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::driver::ConnectionFactory;
use crate::error::SqlMapperError;
use crate::mapping::{MappedStatementBuilder, StatementProvider, StatementRegistry};
use crate::type_handler::{EnumAdapter, TypeAdapter, TypeAdapterRegistry};
use crate::types::{IsolationLevel, SqlType, TypeKey};

/// Engine-wide settings.
///
/// Every field has a default, so a partial JSON document is enough:
/// ```rust
/// use reactive_sql_mapper::prelude::*;
///
/// let settings = Settings::from_json_str(r#"{ "default_isolation_level": "READ_COMMITTED" }"#)?;
/// assert_eq!(settings.default_isolation_level, Some(IsolationLevel::ReadCommitted));
/// assert!(!settings.auto_commit);
/// # Ok::<(), SqlMapperError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sessions opened without an explicit mode commit every statement on its own
    pub auto_commit: bool,
    pub default_isolation_level: Option<IsolationLevel>,
    /// Declared type of NULL parameters that have none
    pub jdbc_type_for_null: SqlType,
    pub map_underscore_to_camel_case: bool,
    /// Default for statements that do not say whether grouped rows arrive ordered
    pub result_ordered: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_commit: false,
            default_isolation_level: None,
            jdbc_type_for_null: SqlType::Other,
            map_underscore_to_camel_case: false,
            result_ordered: false,
        }
    }
}

impl Settings {
    /// # Errors
    /// Returns `SqlMapperError::JsonError` for malformed JSON or unknown enum names.
    pub fn from_json_str(json: &str) -> Result<Self, SqlMapperError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything a session needs, built once and shared by `Arc`.
pub struct Configuration {
    settings: Settings,
    factory: Arc<dyn ConnectionFactory>,
    type_adapters: Arc<TypeAdapterRegistry>,
    statements: Arc<dyn StatementProvider>,
}

impl Configuration {
    #[must_use]
    pub fn builder(factory: Arc<dyn ConnectionFactory>) -> ConfigurationBuilder {
        ConfigurationBuilder::new(factory)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn factory(&self) -> &dyn ConnectionFactory {
        self.factory.as_ref()
    }

    #[must_use]
    pub fn type_adapters(&self) -> &Arc<TypeAdapterRegistry> {
        &self.type_adapters
    }

    #[must_use]
    pub fn statements(&self) -> &dyn StatementProvider {
        self.statements.as_ref()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &self.settings)
            .field("type_adapters", &self.type_adapters)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Configuration`]; statement templates are compiled in [`build`](Self::build)
/// with the factory's placeholder style.
pub struct ConfigurationBuilder {
    factory: Arc<dyn ConnectionFactory>,
    settings: Settings,
    type_adapters: TypeAdapterRegistry,
    statements: Vec<MappedStatementBuilder>,
    provider: Option<Arc<dyn StatementProvider>>,
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            settings: Settings::default(),
            type_adapters: TypeAdapterRegistry::with_defaults(),
            statements: Vec::new(),
            provider: None,
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the built-in adapters with `registry`.
    #[must_use]
    pub fn type_adapters(mut self, registry: TypeAdapterRegistry) -> Self {
        self.type_adapters = registry;
        self
    }

    #[must_use]
    pub fn type_adapter(mut self, key: TypeKey, adapter: impl TypeAdapter + 'static) -> Self {
        self.type_adapters.register(key, adapter);
        self
    }

    #[must_use]
    pub fn enum_adapter(mut self, adapter: EnumAdapter) -> Self {
        self.type_adapters.register_enum(adapter);
        self
    }

    #[must_use]
    pub fn statement(mut self, statement: MappedStatementBuilder) -> Self {
        self.statements.push(statement);
        self
    }

    /// Use an external statement source instead of statements registered on this builder.
    #[must_use]
    pub fn statement_provider(mut self, provider: Arc<dyn StatementProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for malformed templates, duplicate ids, or when both
    /// an external provider and builder statements are given.
    pub fn build(self) -> Result<Configuration, SqlMapperError> {
        let statements: Arc<dyn StatementProvider> = match self.provider {
            Some(provider) if self.statements.is_empty() => provider,
            Some(_) => {
                return Err(SqlMapperError::ConfigError(
                    "statements cannot be registered alongside an external statement provider"
                        .into(),
                ));
            }
            None => {
                let style = self.factory.placeholder_style();
                let mut registry = StatementRegistry::new();
                for statement in self.statements {
                    registry.register(statement.build(style, self.settings.result_ordered)?)?;
                }
                Arc::new(registry)
            }
        };
        Ok(Configuration {
            settings: self.settings,
            factory: self.factory,
            type_adapters: Arc::new(self.type_adapters),
            statements,
        })
    }
}
