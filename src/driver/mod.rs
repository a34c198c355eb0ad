//! The narrow surface a database driver implements.
//!
//! Everything above this module (context, proxy, executor, assembler) talks to drivers only
//! through these traits, so the in-tree SQLite and Postgres backends and any test double are
//! interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::error::SqlMapperError;
use crate::results::DbRow;
use crate::translation::PlaceholderStyle;
use crate::types::{DbValue, IsolationLevel, SqlType};

/// Rows of one driver result, pulled on demand.
pub type RowStream = BoxStream<'static, Result<DbRow, SqlMapperError>>;

/// Results produced by one statement execution.
pub type ResultStream = BoxStream<'static, Result<Box<dyn DriverResult>, SqlMapperError>>;

/// A value handed to [`DriverStatement::bind`].
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Value(DbValue),
    /// NULL of a declared type
    Null(SqlType),
    /// Placeholder for an OUT parameter
    Out(SqlType),
    /// Value of an INOUT parameter with its declared type
    InOut(DbValue, SqlType),
}

impl BindValue {
    /// The input value, if this binding carries one.
    #[must_use]
    pub fn input(&self) -> Option<&DbValue> {
        match self {
            BindValue::Value(value) | BindValue::InOut(value, _) => Some(value),
            BindValue::Null(_) | BindValue::Out(_) => None,
        }
    }
}

/// A statement created on a connection, bound and then executed once.
pub trait DriverStatement: Send {
    /// Bind the parameter at zero-based `index`.
    ///
    /// # Errors
    /// Drivers reject bindings they cannot represent (`Unimplemented`, `ParameterError`).
    fn bind(&mut self, index: usize, value: BindValue) -> Result<(), SqlMapperError>;

    /// Ask the driver to return these generated columns instead of an update count.
    fn return_generated_values(&mut self, columns: &[String]);

    /// Run the statement. Nothing is sent to the database until the stream is polled.
    fn execute(self: Box<Self>) -> ResultStream;
}

/// One result of an executed statement: an update count or a row stream.
pub trait DriverResult: Send {
    fn rows_updated(self: Box<Self>) -> BoxFuture<'static, Result<u64, SqlMapperError>>;

    fn rows(self: Box<Self>) -> RowStream;
}

/// A live database connection.
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// # Errors
    /// Returns `SqlMapperError::IllegalState` if the connection is closed.
    fn create_statement(&self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlMapperError>;

    async fn begin_transaction(&self) -> Result<(), SqlMapperError>;

    async fn commit_transaction(&self) -> Result<(), SqlMapperError>;

    async fn rollback_transaction(&self) -> Result<(), SqlMapperError>;

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), SqlMapperError>;

    async fn set_isolation_level(&self, level: IsolationLevel) -> Result<(), SqlMapperError>;

    /// Release the physical connection.
    async fn close(&self) -> Result<(), SqlMapperError>;
}

/// Opens new driver connections.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// How positional parameters are written in SQL for this driver.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` (or a transparent driver error) on failure.
    async fn create(&self) -> Result<Arc<dyn DriverConnection>, SqlMapperError>;
}
