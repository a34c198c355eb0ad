//! Postgres driver over tokio-postgres.
//!
//! - config: connection options and validation
//! - params: binding driver values to Postgres types
//! - query: reading row values

pub mod config;
pub mod params;
pub mod query;

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream;
use tokio::task::AbortHandle;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, warn};

use crate::driver::{
    BindValue, ConnectionFactory, DriverConnection, DriverResult, DriverStatement, ResultStream,
    RowStream,
};
use crate::error::SqlMapperError;
use crate::results::{Columns, DbRow};
use crate::translation::PlaceholderStyle;
use crate::types::{DbValue, IsolationLevel};

pub use config::{PostgresOptions, PostgresOptionsBuilder};
pub use params::bind_value_to_postgres;
pub use query::postgres_extract_value;

/// Opens one tokio-postgres client per [`create`](ConnectionFactory::create).
#[derive(Debug, Clone)]
pub struct PostgresConnectionFactory {
    config: PgConfig,
}

impl PostgresConnectionFactory {
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if a required field is missing.
    pub fn new(options: PostgresOptions) -> Result<Self, SqlMapperError> {
        Ok(Self {
            config: options.to_config()?,
        })
    }

    #[must_use]
    pub fn builder() -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::new()
    }
}

#[async_trait]
impl ConnectionFactory for PostgresConnectionFactory {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Postgres
    }

    async fn create(&self) -> Result<Arc<dyn DriverConnection>, SqlMapperError> {
        let (client, connection) = self.config.connect(NoTls).await?;
        let task = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!("postgres connection ended with error: {err}");
            }
        });
        Ok(Arc::new(PgConnection {
            client: Arc::new(client),
            closed: AtomicBool::new(false),
            task: task.abort_handle(),
        }))
    }
}

/// A tokio-postgres client plus the task driving its socket.
#[derive(Debug)]
pub struct PgConnection {
    client: Arc<Client>,
    closed: AtomicBool,
    task: AbortHandle,
}

impl PgConnection {
    fn client(&self) -> Result<&Client, SqlMapperError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlMapperError::IllegalState(
                "Postgres connection is closed".into(),
            ));
        }
        Ok(&self.client)
    }
}

#[async_trait]
impl DriverConnection for PgConnection {
    fn create_statement(&self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlMapperError> {
        self.client()?;
        Ok(Box::new(PgStatement {
            client: Arc::clone(&self.client),
            sql: sql.to_string(),
            params: Vec::new(),
            returning: Vec::new(),
        }))
    }

    async fn begin_transaction(&self) -> Result<(), SqlMapperError> {
        Ok(self.client()?.batch_execute("BEGIN").await?)
    }

    async fn commit_transaction(&self) -> Result<(), SqlMapperError> {
        Ok(self.client()?.batch_execute("COMMIT").await?)
    }

    async fn rollback_transaction(&self) -> Result<(), SqlMapperError> {
        Ok(self.client()?.batch_execute("ROLLBACK").await?)
    }

    async fn set_auto_commit(&self, _auto_commit: bool) -> Result<(), SqlMapperError> {
        // outside BEGIN every statement commits on its own
        Ok(())
    }

    async fn set_isolation_level(&self, level: IsolationLevel) -> Result<(), SqlMapperError> {
        let sql = format!(
            "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {}",
            level.as_sql()
        );
        Ok(self.client()?.batch_execute(&sql).await?)
    }

    async fn close(&self) -> Result<(), SqlMapperError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("closing Postgres connection");
        self.task.abort();
        Ok(())
    }
}

struct PgStatement {
    client: Arc<Client>,
    sql: String,
    params: Vec<DbValue>,
    returning: Vec<String>,
}

impl DriverStatement for PgStatement {
    fn bind(&mut self, index: usize, value: BindValue) -> Result<(), SqlMapperError> {
        let value = bind_value_to_postgres(value)?;
        if self.params.len() <= index {
            self.params.resize(index + 1, DbValue::Null);
        }
        self.params[index] = value;
        Ok(())
    }

    fn return_generated_values(&mut self, columns: &[String]) {
        self.returning = columns.to_vec();
    }

    fn execute(self: Box<Self>) -> ResultStream {
        let sql = if self.returning.is_empty() {
            self.sql
        } else {
            format!(
                "{} RETURNING {}",
                self.sql.trim_end().trim_end_matches(';'),
                self.returning.join(", ")
            )
        };
        let result: Box<dyn DriverResult> = Box::new(PgResult {
            client: self.client,
            sql,
            params: self.params,
        });
        stream::once(async move { Ok(result) }).boxed()
    }
}

struct PgResult {
    client: Arc<Client>,
    sql: String,
    params: Vec<DbValue>,
}

impl DriverResult for PgResult {
    fn rows_updated(self: Box<Self>) -> BoxFuture<'static, Result<u64, SqlMapperError>> {
        Box::pin(async move {
            Ok(self
                .client
                .execute_raw(self.sql.as_str(), self.params.iter())
                .await?)
        })
    }

    fn rows(self: Box<Self>) -> RowStream {
        let PgResult {
            client,
            sql,
            params,
        } = *self;
        Box::pin(try_stream! {
            let statement = client.prepare(&sql).await?;
            let columns = Columns::new(
                statement.columns().iter().map(|c| c.name().to_string()).collect(),
            );
            let raw = client.query_raw(&statement, params.iter()).await?;
            let mut rows = pin!(raw);
            while let Some(row) = rows.next().await {
                let row = row?;
                let values = (0..columns.len())
                    .map(|i| postgres_extract_value(&row, i))
                    .collect::<Result<Vec<_>, _>>()?;
                yield DbRow::new(Arc::clone(&columns), values);
            }
        })
    }
}
