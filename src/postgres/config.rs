use tokio_postgres::Config as PgConfig;

use crate::error::SqlMapperError;

use super::PostgresConnectionFactory;

/// Connection settings for Postgres. Every field is required.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl PostgresOptions {
    /// Validate the settings and turn them into a `tokio_postgres::Config`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` naming the first missing field.
    pub fn to_config(&self) -> Result<PgConfig, SqlMapperError> {
        let dbname = required(self.dbname.as_deref(), "dbname")?;
        let host = required(self.host.as_deref(), "host")?;
        let port = self
            .port
            .ok_or_else(|| SqlMapperError::ConfigError("port is required".to_string()))?;
        let user = required(self.user.as_deref(), "user")?;
        let password = required(self.password.as_deref(), "password")?;

        let mut config = PgConfig::new();
        config
            .host(host)
            .port(port)
            .dbname(dbname)
            .user(user)
            .password(password);
        Ok(config)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, SqlMapperError> {
    value.ok_or_else(|| SqlMapperError::ConfigError(format!("{field} is required")))
}

/// Fluent builder for Postgres options.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptionsBuilder {
    opts: PostgresOptions,
}

impl PostgresOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = Some(port);
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.opts.dbname = Some(dbname.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> PostgresOptions {
        self.opts
    }

    /// Validate the options and build a connection factory. No connection is opened.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if a required field is missing.
    pub fn build(self) -> Result<PostgresConnectionFactory, SqlMapperError> {
        PostgresConnectionFactory::new(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_reported_by_name() {
        let err = PostgresOptionsBuilder::new()
            .host("localhost")
            .dbname("app")
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(msg) if msg == "port is required"));

        let factory = PostgresOptionsBuilder::new()
            .host("localhost")
            .port(5432)
            .dbname("app")
            .user("app")
            .password("secret")
            .build();
        assert!(factory.is_ok());
    }
}
