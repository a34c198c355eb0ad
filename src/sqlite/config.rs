use std::time::Duration;

use crate::error::SqlMapperError;

use super::SqliteConnectionFactory;
use super::worker::SqliteWorker;

/// Rows buffered between the worker thread and the consuming stream.
pub const DEFAULT_ROW_BUFFER: usize = 64;

/// Options for opening `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Option<Duration>,
    /// Bound of the row channel; the worker blocks once this many rows are unread.
    pub row_buffer: usize,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout: None,
            row_buffer: DEFAULT_ROW_BUFFER,
        }
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub(crate) fn is_memory(&self) -> bool {
        self.db_path == ":memory:" || self.db_path.starts_with("file::memory:")
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn row_buffer(mut self, rows: usize) -> Self {
        self.opts.row_buffer = rows.max(1);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a connection factory, opening one connection up front to switch a file database
    /// to WAL mode.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError` if the database cannot be opened or the pragma fails.
    pub async fn build(self) -> Result<SqliteConnectionFactory, SqlMapperError> {
        let opts = self.finish();
        if !opts.is_memory() {
            let worker = SqliteWorker::spawn(&opts).await?;
            worker
                .execute_batch("PRAGMA journal_mode = WAL;".to_string())
                .await?;
            worker.close().await?;
        }
        Ok(SqliteConnectionFactory::new(opts))
    }
}

impl SqliteConnectionFactory {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}
