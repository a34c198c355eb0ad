use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// An operation ran outside an initialized session scope.
    #[error("no execution context is initialized for this session scope")]
    ContextMissing,

    #[error("could not bind parameter {mapping}: {source}")]
    TypeBindingError {
        mapping: String,
        #[source]
        source: Box<SqlMapperError>,
    },

    #[error("expected one result (or none) to be returned by {statement}, but found {found}")]
    TooManyResults { statement: String, found: usize },

    /// Commit or rollback failed; the connection has already been closed.
    #[error("transaction {action} failed: {source}")]
    TransactionStateError {
        action: &'static str,
        #[source]
        source: Box<SqlMapperError>,
    },

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Mapped statement not found: {0}")]
    StatementNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Result mapping error: {0}")]
    MappingError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlMapperError {
    pub(crate) fn binding(mapping: String, source: SqlMapperError) -> Self {
        SqlMapperError::TypeBindingError {
            mapping,
            source: Box::new(source),
        }
    }

    pub(crate) fn transaction(action: &'static str, source: SqlMapperError) -> Self {
        SqlMapperError::TransactionStateError {
            action,
            source: Box::new(source),
        }
    }
}
