//! `SQLite` driver backed by rusqlite.
//!
//! Each connection owns a worker thread (see `worker`) that holds the `rusqlite::Connection`.
//! Query rows cross back to async code through a bounded channel, so a slow consumer throttles
//! the cursor instead of buffering the whole result.
//!
//! - config: connection options and the factory builder
//! - params: binding driver values to `SQLite` values
//! - query: cursor reading and value extraction

pub mod config;
pub mod params;
pub mod query;
mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream;
use rusqlite::types::Value;
use tracing::debug;

use crate::driver::{
    BindValue, ConnectionFactory, DriverConnection, DriverResult, DriverStatement, ResultStream,
    RowStream,
};
use crate::error::SqlMapperError;
use crate::translation::PlaceholderStyle;
use crate::types::IsolationLevel;

pub use config::{DEFAULT_ROW_BUFFER, SqliteOptions, SqliteOptionsBuilder};
pub use params::{bind_value_to_sqlite_value, db_value_to_sqlite_value};
pub use query::sqlite_extract_value_sync;

use worker::SqliteWorker;

/// Opens a new `SQLite` connection (and worker thread) per [`create`](ConnectionFactory::create).
///
/// Every `:memory:` connection is a separate database.
#[derive(Debug, Clone)]
pub struct SqliteConnectionFactory {
    options: SqliteOptions,
}

impl SqliteConnectionFactory {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// Open a connection directly, outside any session.
    ///
    /// # Errors
    /// Returns `SqlMapperError` if the database cannot be opened.
    pub async fn connect(&self) -> Result<SqliteConnection, SqlMapperError> {
        SqliteConnection::open(&self.options).await
    }
}

#[async_trait]
impl ConnectionFactory for SqliteConnectionFactory {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    async fn create(&self) -> Result<Arc<dyn DriverConnection>, SqlMapperError> {
        let conn = self.connect().await?;
        Ok(Arc::new(conn))
    }
}

/// A worker-backed `SQLite` connection.
#[derive(Debug)]
pub struct SqliteConnection {
    worker: Arc<SqliteWorker>,
    closed: AtomicBool,
    row_buffer: usize,
}

impl SqliteConnection {
    /// # Errors
    /// Returns `SqlMapperError` if the worker cannot be spawned or the database cannot be opened.
    pub async fn open(options: &SqliteOptions) -> Result<Self, SqlMapperError> {
        let worker = SqliteWorker::spawn(options).await?;
        Ok(Self {
            worker: Arc::new(worker),
            closed: AtomicBool::new(false),
            row_buffer: options.row_buffer,
        })
    }

    /// Run a batch of SQL (schema setup, pragmas) outside statement mapping.
    ///
    /// # Errors
    /// Returns the `SQLite` error, or `IllegalState` once the connection is closed.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.worker.execute_batch(sql.to_string()).await
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlMapperError::IllegalState(
                "SQLite connection is closed".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    fn create_statement(&self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlMapperError> {
        self.ensure_open()?;
        Ok(Box::new(SqliteStatement {
            worker: Arc::clone(&self.worker),
            sql: sql.to_string(),
            params: Vec::new(),
            returning: Vec::new(),
            row_buffer: self.row_buffer,
        }))
    }

    async fn begin_transaction(&self) -> Result<(), SqlMapperError> {
        self.execute_batch("BEGIN").await
    }

    async fn commit_transaction(&self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.worker.end_transaction(true).await
    }

    async fn rollback_transaction(&self) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.worker.end_transaction(false).await
    }

    async fn set_auto_commit(&self, _auto_commit: bool) -> Result<(), SqlMapperError> {
        // SQLite is in auto-commit mode whenever no BEGIN is open.
        Ok(())
    }

    async fn set_isolation_level(&self, level: IsolationLevel) -> Result<(), SqlMapperError> {
        let read_uncommitted = i32::from(level == IsolationLevel::ReadUncommitted);
        self.execute_batch(&format!("PRAGMA read_uncommitted = {read_uncommitted};"))
            .await
    }

    async fn close(&self) -> Result<(), SqlMapperError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(worker = ?self.worker, "closing SQLite connection");
        self.worker.close().await
    }
}

struct SqliteStatement {
    worker: Arc<SqliteWorker>,
    sql: String,
    params: Vec<Value>,
    returning: Vec<String>,
    row_buffer: usize,
}

impl SqliteStatement {
    fn final_sql(&self) -> String {
        if self.returning.is_empty() {
            return self.sql.clone();
        }
        format!(
            "{} RETURNING {}",
            self.sql.trim_end().trim_end_matches(';'),
            self.returning.join(", ")
        )
    }
}

impl DriverStatement for SqliteStatement {
    fn bind(&mut self, index: usize, value: BindValue) -> Result<(), SqlMapperError> {
        let value = bind_value_to_sqlite_value(value)?;
        if self.params.len() <= index {
            self.params.resize(index + 1, Value::Null);
        }
        self.params[index] = value;
        Ok(())
    }

    fn return_generated_values(&mut self, columns: &[String]) {
        self.returning = columns.to_vec();
    }

    fn execute(self: Box<Self>) -> ResultStream {
        let result: Box<dyn DriverResult> = Box::new(SqliteResult {
            sql: self.final_sql(),
            worker: self.worker,
            params: self.params,
            row_buffer: self.row_buffer,
        });
        stream::once(async move { Ok(result) }).boxed()
    }
}

/// The single result of a `SQLite` statement. Nothing runs until it is consumed.
struct SqliteResult {
    worker: Arc<SqliteWorker>,
    sql: String,
    params: Vec<Value>,
    row_buffer: usize,
}

impl DriverResult for SqliteResult {
    fn rows_updated(self: Box<Self>) -> BoxFuture<'static, Result<u64, SqlMapperError>> {
        Box::pin(async move {
            let changed = self.worker.execute(self.sql, self.params).await?;
            Ok(changed as u64)
        })
    }

    fn rows(self: Box<Self>) -> RowStream {
        let SqliteResult {
            worker,
            sql,
            params,
            row_buffer,
        } = *self;
        Box::pin(try_stream! {
            let mut receiver = worker.query(sql, params, row_buffer)?;
            while let Some(row) = receiver.recv().await {
                yield row?;
            }
        })
    }
}
