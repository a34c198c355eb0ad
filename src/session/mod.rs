//! The caller-facing unit of work.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Configuration;
use crate::connection::{acquire_connection, close_connection, plan_close, spawn_plan};
use crate::context::{ContextScope, ExecutionContext};
use crate::error::SqlMapperError;
use crate::executor::StatementExecutor;
use crate::mapping::MappedStatement;
use crate::record::{ParameterObject, Record};
use crate::results::RowBounds;
use crate::types::IsolationLevel;

/// Opens sessions over one shared [`Configuration`].
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: Arc<Configuration>,
}

impl SessionFactory {
    #[must_use]
    pub fn new(config: Configuration) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// A session using the configured auto-commit mode and isolation level.
    #[must_use]
    pub fn open_session(&self) -> Session {
        let settings = self.config.settings();
        self.open_session_with(settings.auto_commit, settings.default_isolation_level)
    }

    #[must_use]
    pub fn open_session_with(
        &self,
        auto_commit: bool,
        isolation_level: Option<IsolationLevel>,
    ) -> Session {
        Session {
            config: Arc::clone(&self.config),
            executor: StatementExecutor::new(Arc::clone(&self.config)),
            scope: ContextScope::new(),
            auto_commit,
            isolation_level,
        }
    }
}

/// One logical unit of work.
///
/// A session owns its execution context and at most one connection. Outside auto-commit mode
/// the first statement starts a transaction that lasts until [`commit`](Self::commit),
/// [`rollback`](Self::rollback) or [`close`](Self::close). Query streams borrow the session
/// mutably, so statements of one session never overlap.
///
/// ```rust,no_run
/// # use reactive_sql_mapper::prelude::*;
/// # use futures_util::TryStreamExt;
/// # async fn demo(factory: SessionFactory) -> Result<(), SqlMapperError> {
/// let mut session = factory.open_session();
/// let mut user = ParameterObject::from(Record::new().with("name", "ann"));
/// session.insert("insertUser", &mut user).await?;
/// let users: Vec<Record> = session
///     .select_list("selectUsers", (), RowBounds::default())
///     .try_collect()
///     .await?;
/// session.commit(false).await?;
/// session.close().await?;
/// # let _ = users;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: Arc<Configuration>,
    executor: StatementExecutor,
    scope: ContextScope,
    auto_commit: bool,
    isolation_level: Option<IsolationLevel>,
}

impl Session {
    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// The session's context, once a first operation has installed it.
    #[must_use]
    pub fn context(&self) -> Option<&ExecutionContext> {
        self.scope.peek()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.scope.peek().is_some_and(|ctx| ctx.dirty)
    }

    fn ensure_context(&mut self) -> &mut ExecutionContext {
        let (auto_commit, isolation_level) = (self.auto_commit, self.isolation_level);
        self.scope.initialize(
            || ExecutionContext::new(auto_commit, isolation_level),
            |_| {},
        )
    }

    fn statement(&self, id: &str) -> Result<Arc<MappedStatement>, SqlMapperError> {
        self.config
            .statements()
            .statement(id)
            .ok_or_else(|| SqlMapperError::StatementNotFound(id.to_string()))
    }

    /// Stream the records of a select statement under `bounds`.
    pub fn select_list(
        &mut self,
        id: &str,
        parameter: impl Into<ParameterObject>,
        bounds: RowBounds,
    ) -> BoxStream<'_, Result<Record, SqlMapperError>> {
        let statement = match self.statement(id) {
            Ok(statement) => statement,
            Err(err) => return stream::once(async move { Err(err) }).boxed(),
        };
        self.ensure_context();
        self.executor
            .query(&mut self.scope, statement, parameter.into(), bounds)
    }

    /// The single record of a select statement, or `None`.
    ///
    /// Reading stops at the second record; the rest of the result is never fetched.
    ///
    /// # Errors
    /// Returns `SqlMapperError::TooManyResults` when the statement produced more than one result;
    /// no record is returned in that case.
    pub async fn select_one(
        &mut self,
        id: &str,
        parameter: impl Into<ParameterObject>,
    ) -> Result<Option<Record>, SqlMapperError> {
        let mut records = self.select_list(id, parameter, RowBounds::default());
        let Some(first) = records.next().await.transpose()? else {
            return Ok(None);
        };
        match records.next().await {
            None => Ok(Some(first)),
            Some(second) => {
                second?;
                // dropping the stream releases the connection
                drop(records);
                Err(SqlMapperError::TooManyResults {
                    statement: id.to_string(),
                    found: 2,
                })
            }
        }
    }

    /// [`select_one`](Self::select_one) deserialized into `T`.
    ///
    /// # Errors
    /// As `select_one`, plus `SqlMapperError::JsonError` when the record does not fit `T`.
    pub async fn select_one_as<T: DeserializeOwned>(
        &mut self,
        id: &str,
        parameter: impl Into<ParameterObject>,
    ) -> Result<Option<T>, SqlMapperError> {
        self.select_one(id, parameter)
            .await?
            .map(|record| record.deserialize())
            .transpose()
    }

    /// # Errors
    /// See [`StatementExecutor::update`].
    pub async fn insert(
        &mut self,
        id: &str,
        parameter: &mut ParameterObject,
    ) -> Result<u64, SqlMapperError> {
        self.execute_update(id, parameter).await
    }

    /// # Errors
    /// See [`StatementExecutor::update`].
    pub async fn update(
        &mut self,
        id: &str,
        parameter: &mut ParameterObject,
    ) -> Result<u64, SqlMapperError> {
        self.execute_update(id, parameter).await
    }

    /// # Errors
    /// See [`StatementExecutor::update`].
    pub async fn delete(
        &mut self,
        id: &str,
        parameter: &mut ParameterObject,
    ) -> Result<u64, SqlMapperError> {
        self.execute_update(id, parameter).await
    }

    async fn execute_update(
        &mut self,
        id: &str,
        parameter: &mut ParameterObject,
    ) -> Result<u64, SqlMapperError> {
        let statement = self.statement(id)?;
        self.ensure_context();
        self.executor
            .update(&mut self.scope, &statement, parameter)
            .await
    }

    /// Commit the session transaction. Without `force` this does nothing unless an update ran
    /// since the last commit or rollback (and the session is not in auto-commit mode).
    ///
    /// # Errors
    /// `TransactionStateError` when the driver commit fails; the connection is closed by then.
    pub async fn commit(&mut self, force: bool) -> Result<(), SqlMapperError> {
        self.end_transaction(force, true).await
    }

    /// Roll back the session transaction, with the same skip rule as [`commit`](Self::commit).
    ///
    /// # Errors
    /// `TransactionStateError` when the driver rollback fails; the connection is closed by then.
    pub async fn rollback(&mut self, force: bool) -> Result<(), SqlMapperError> {
        self.end_transaction(force, false).await
    }

    async fn end_transaction(&mut self, force: bool, commit: bool) -> Result<(), SqlMapperError> {
        let config = Arc::clone(&self.config);
        let ctx = self.ensure_context();
        if !ctx.is_commit_or_rollback_required(force) {
            debug!(commit, "nothing to end; skipping driver call");
            return Ok(());
        }
        if commit {
            ctx.force_commit = true;
        } else {
            ctx.force_rollback = true;
        }
        let outcome = match acquire_connection(ctx, config.factory()).await.map(|_| ()) {
            Ok(()) => close_connection(ctx).await,
            Err(err) => Err(err),
        };
        ctx.force_commit = false;
        ctx.force_rollback = false;
        ctx.dirty = false;
        outcome
    }

    /// End the session: roll back uncommitted updates, close the connection and discard the
    /// context.
    ///
    /// # Errors
    /// Returns the rollback or close failure; the context is discarded regardless.
    pub async fn close(mut self) -> Result<(), SqlMapperError> {
        let result = match self.scope.current() {
            Ok(ctx) => {
                ctx.require_close = true;
                if ctx.dirty && !ctx.auto_commit() {
                    ctx.force_rollback = true;
                }
                close_connection(ctx).await
            }
            Err(_) => Ok(()),
        };
        self.scope.teardown();
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(mut ctx) = self.scope.teardown() else {
            return;
        };
        if ctx.connection().is_none() {
            return;
        }
        ctx.require_close = true;
        if ctx.dirty && !ctx.auto_commit() {
            ctx.force_rollback = true;
        }
        spawn_plan(plan_close(&mut ctx), "dropped session");
    }
}
