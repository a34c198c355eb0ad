//! Statement execution on the connection of an execution context.

mod binder;
mod keys;
mod log;

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::warn;

use crate::config::Configuration;
use crate::connection::ConnectionLease;
use crate::context::ContextScope;
use crate::error::SqlMapperError;
use crate::mapping::{BoundSql, MappedStatement};
use crate::record::{ParameterObject, Record};
use crate::results::{RecordStream, ResultStreamAssembler, RowBounds, RowMapper};

pub(crate) use binder::ParameterBinder;

/// Runs mapped statements inside the context of a [`ContextScope`].
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    config: Arc<Configuration>,
    assembler: ResultStreamAssembler,
}

impl StatementExecutor {
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        let mapper = RowMapper::new(
            Arc::clone(config.type_adapters()),
            config.settings().map_underscore_to_camel_case,
        );
        Self {
            config,
            assembler: ResultStreamAssembler::new(mapper),
        }
    }

    /// Execute an insert, update or delete.
    ///
    /// The context is marked dirty before the statement runs. With key generation the returned
    /// count is the number of generated-key rows written back onto `parameter`.
    ///
    /// # Errors
    /// `ContextMissing` outside an initialized scope, `TypeBindingError` when a parameter cannot
    /// be bound, and driver failures. The connection is released on every path.
    pub async fn update(
        &self,
        scope: &mut ContextScope,
        statement: &MappedStatement,
        parameter: &mut ParameterObject,
    ) -> Result<u64, SqlMapperError> {
        let ctx = scope.current()?;
        let bound_sql = statement.sql_source().bound_sql(parameter)?;
        log::preparing(statement.id(), bound_sql.sql());
        ctx.dirty = true;

        let lease = ConnectionLease::acquire(ctx, self.config.factory()).await?;
        let outcome = self.run_update(&lease, statement, &bound_sql, parameter).await;
        let released = lease.release().await;
        match outcome {
            Ok(count) => {
                released?;
                log::updates(statement.id(), count);
                Ok(count)
            }
            Err(err) => {
                if let Err(release_err) = released {
                    warn!(
                        statement = statement.id(),
                        "release after failed update also failed: {release_err}"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_update(
        &self,
        lease: &ConnectionLease<'_>,
        statement: &MappedStatement,
        bound_sql: &BoundSql,
        parameter: &mut ParameterObject,
    ) -> Result<u64, SqlMapperError> {
        let mut driver_statement = lease.connection()?.create_statement(bound_sql.sql())?;
        let bound = ParameterBinder::new(self.config.type_adapters(), self.config.settings())
            .bind_all(driver_statement.as_mut(), bound_sql, parameter)?;
        log::parameters(statement.id(), &bound);

        match statement.key_generation() {
            Some(keys) => {
                driver_statement.return_generated_values(&keys.key_columns);
                keys::apply_generated_keys(driver_statement.execute(), keys, parameter).await
            }
            None => {
                let mut results = driver_statement.execute();
                let mut updated = 0;
                while let Some(result) = results.next().await {
                    updated += result?.rows_updated().await?;
                }
                Ok(updated)
            }
        }
    }

    /// Execute a query and stream its mapped records.
    ///
    /// Nothing happens until the stream is polled. The connection is released when the stream
    /// ends, fails, or is dropped early; `scope` stays borrowed for the stream's lifetime.
    pub fn query<'s>(
        &self,
        scope: &'s mut ContextScope,
        statement: Arc<MappedStatement>,
        parameter: ParameterObject,
        bounds: RowBounds,
    ) -> BoxStream<'s, Result<Record, SqlMapperError>> {
        let config = Arc::clone(&self.config);
        let assembler = self.assembler.clone();
        Box::pin(try_stream! {
            let ctx = scope.current()?;
            let bound_sql = statement.sql_source().bound_sql(&parameter)?;
            log::preparing(statement.id(), bound_sql.sql());

            let lease = ConnectionLease::acquire(ctx, config.factory()).await?;
            let mut failure = None;
            let mut total = 0usize;
            let opened = open_records(
                &config,
                &assembler,
                &lease,
                &statement,
                &bound_sql,
                &parameter,
                bounds,
            )
            .await;
            match opened {
                Ok(mut records) => {
                    while let Some(item) = records.next().await {
                        match item {
                            Ok(record) => {
                                total += 1;
                                yield record;
                            }
                            Err(err) => {
                                failure = Some(err);
                                break;
                            }
                        }
                    }
                }
                Err(err) => failure = Some(err),
            }

            let released = lease.release().await;
            if let Some(err) = failure {
                if let Err(release_err) = released {
                    warn!(
                        statement = statement.id(),
                        "release after failed query also failed: {release_err}"
                    );
                }
                Err::<(), SqlMapperError>(err)?;
            } else {
                released?;
                log::total(statement.id(), total);
            }
        })
    }
}

async fn open_records(
    config: &Configuration,
    assembler: &ResultStreamAssembler,
    lease: &ConnectionLease<'_>,
    statement: &MappedStatement,
    bound_sql: &BoundSql,
    parameter: &ParameterObject,
    bounds: RowBounds,
) -> Result<RecordStream, SqlMapperError> {
    let mut driver_statement = lease.connection()?.create_statement(bound_sql.sql())?;
    let bound = ParameterBinder::new(config.type_adapters(), config.settings()).bind_all(
        driver_statement.as_mut(),
        bound_sql,
        parameter,
    )?;
    log::parameters(statement.id(), &bound);

    let mut results = driver_statement.execute();
    let rows = match results.next().await {
        Some(result) => result?.rows(),
        None => futures_util::stream::empty().boxed(),
    };
    Ok(assembler.assemble(
        rows,
        statement.result_map().cloned(),
        statement.result_ordered(),
        bounds,
    ))
}
