use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::guard::ConnectionCloseGuard;
use crate::context::ExecutionContext;
use crate::driver::{ConnectionFactory, DriverStatement};
use crate::error::SqlMapperError;
use crate::types::IsolationLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    CommitPending,
    RollbackPending,
    CloseRequired,
    Closed,
}

/// A borrowed connection whose "close" is decided by the execution context.
///
/// Closing it may commit, roll back, defer until the session's transaction ends, or really
/// close, see [`close_connection`].
pub struct TransactionAwareConnection {
    guard: Arc<ConnectionCloseGuard>,
    state: ConnectionState,
    suspend_close: bool,
    transaction_open: bool,
}

impl TransactionAwareConnection {
    /// `suspend_close` marks connections that take part in a session transaction: closing them
    /// without a pending commit or rollback is deferred.
    #[must_use]
    pub fn new(guard: Arc<ConnectionCloseGuard>, suspend_close: bool) -> Self {
        Self {
            guard,
            state: ConnectionState::Active,
            suspend_close,
            transaction_open: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.guard.is_closed() {
            ConnectionState::Closed
        } else {
            self.state
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    #[must_use]
    pub fn suspend_close(&self) -> bool {
        self.suspend_close
    }

    #[must_use]
    pub fn transaction_open(&self) -> bool {
        self.transaction_open
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<ConnectionCloseGuard> {
        &self.guard
    }

    /// # Errors
    /// Returns `SqlMapperError::IllegalState` on a closed connection, or the driver's failure.
    pub fn create_statement(&self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlMapperError> {
        self.ensure_open()?;
        self.guard.target()?.create_statement(sql)
    }

    /// Start the session transaction on this connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::IllegalState` on a closed connection, or the driver's failure.
    pub async fn begin(
        &mut self,
        auto_commit: bool,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        let target = Arc::clone(self.guard.target()?);
        target.set_auto_commit(auto_commit).await?;
        if let Some(level) = isolation_level {
            target.set_isolation_level(level).await?;
        }
        target.begin_transaction().await?;
        self.transaction_open = true;
        debug!(?isolation_level, "transaction started");
        Ok(())
    }

    /// A pending commit or rollback that kept the connection open has run; the connection is
    /// usable again.
    fn settle(&mut self) {
        if matches!(
            self.state,
            ConnectionState::CommitPending | ConnectionState::RollbackPending
        ) {
            self.state = ConnectionState::Active;
        }
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.is_closed() {
            return Err(SqlMapperError::IllegalState(
                "operation on a closed connection".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TransactionAwareConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionAwareConnection")
            .field("state", &self.state())
            .field("suspend_close", &self.suspend_close)
            .field("transaction_open", &self.transaction_open)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionAction {
    Commit,
    Rollback,
}

impl TransactionAction {
    fn as_str(self) -> &'static str {
        match self {
            TransactionAction::Commit => "commit",
            TransactionAction::Rollback => "rollback",
        }
    }
}

/// The outcome of closing a borrowed connection, decided synchronously against the context and
/// executed afterwards.
#[derive(Debug)]
pub(crate) enum ClosePlan {
    Nothing,
    Defer,
    Close(Arc<ConnectionCloseGuard>),
    Finish {
        guard: Arc<ConnectionCloseGuard>,
        action: TransactionAction,
        then_close: bool,
    },
}

impl ClosePlan {
    pub(crate) fn is_noop(&self) -> bool {
        matches!(self, ClosePlan::Nothing | ClosePlan::Defer)
    }

    /// Run the planned driver calls.
    ///
    /// A failed commit or rollback closes the connection before the failure is returned.
    pub(crate) async fn execute(self) -> Result<(), SqlMapperError> {
        match self {
            ClosePlan::Nothing | ClosePlan::Defer => Ok(()),
            ClosePlan::Close(guard) => guard.close().await,
            ClosePlan::Finish {
                guard,
                action,
                then_close,
            } => {
                let target = Arc::clone(guard.target()?);
                let outcome = match action {
                    TransactionAction::Commit => target.commit_transaction().await,
                    TransactionAction::Rollback => target.rollback_transaction().await,
                };
                match outcome {
                    Ok(()) => {
                        debug!(action = action.as_str(), then_close, "transaction finished");
                        if then_close {
                            guard.close().await
                        } else {
                            Ok(())
                        }
                    }
                    Err(err) => {
                        if let Err(close_err) = guard.close().await {
                            warn!(
                                action = action.as_str(),
                                "close after failed transaction end also failed: {close_err}"
                            );
                        }
                        Err(SqlMapperError::transaction(action.as_str(), err))
                    }
                }
            }
        }
    }
}

/// Decide what closing the bound connection means for `ctx`, applying the state transition and
/// unbinding the connection when it is going to be really closed.
pub(crate) fn plan_close(ctx: &mut ExecutionContext) -> ClosePlan {
    let Some(conn) = ctx.connection_mut() else {
        return ClosePlan::Nothing;
    };
    if conn.is_closed() {
        ctx.clear_connection();
        return ClosePlan::Nothing;
    }
    let guard = Arc::clone(&conn.guard);
    let suspend_close = conn.suspend_close;

    let finish = if ctx.force_rollback {
        ctx.force_rollback = false;
        Some((TransactionAction::Rollback, ConnectionState::RollbackPending))
    } else if ctx.force_commit {
        ctx.force_commit = false;
        Some((TransactionAction::Commit, ConnectionState::CommitPending))
    } else {
        None
    };

    if let Some((action, state)) = finish {
        let then_close = ctx.require_close;
        if then_close {
            ctx.clear_connection();
        } else if let Some(conn) = ctx.connection_mut() {
            conn.state = state;
            conn.transaction_open = false;
        }
        debug!(
            action = action.as_str(),
            then_close, "connection close resolved to transaction end"
        );
        return ClosePlan::Finish {
            guard,
            action,
            then_close,
        };
    }

    if ctx.require_close {
        if let Some(conn) = ctx.connection_mut() {
            conn.state = ConnectionState::CloseRequired;
        }
        ctx.clear_connection();
        debug!("connection close required");
        return ClosePlan::Close(guard);
    }

    if suspend_close {
        debug!("connection close deferred to the end of the session transaction");
        return ClosePlan::Defer;
    }

    ctx.clear_connection();
    debug!("connection closed");
    ClosePlan::Close(guard)
}

/// Close the connection bound to `ctx` according to the context's flags.
///
/// # Errors
/// Returns `SqlMapperError::TransactionStateError` if a commit or rollback failed (the
/// connection is closed and unbound by then), or the release failure.
pub async fn close_connection(ctx: &mut ExecutionContext) -> Result<(), SqlMapperError> {
    let result = plan_close(ctx).execute().await;
    match ctx.connection_mut() {
        Some(conn) if conn.is_closed() => {
            ctx.clear_connection();
        }
        Some(conn) => conn.settle(),
        None => {}
    }
    result
}

/// Make sure `ctx` has an open connection, creating and binding one if needed and starting the
/// session transaction when the context asks for one.
///
/// # Errors
/// Returns the factory's or the driver's failure; a connection whose transaction could not be
/// started is unbound and closed first.
pub async fn acquire_connection<'c>(
    ctx: &'c mut ExecutionContext,
    factory: &dyn ConnectionFactory,
) -> Result<&'c TransactionAwareConnection, SqlMapperError> {
    if ctx.connection().is_some_and(TransactionAwareConnection::is_closed) {
        debug!("bound connection is closed; unbinding it");
        ctx.clear_connection();
    }
    if ctx.connection().is_none() {
        let raw = factory.create().await?;
        let suspend_close = ctx.with_transaction();
        ctx.bind_connection(TransactionAwareConnection::new(
            ConnectionCloseGuard::new(raw),
            suspend_close,
        ))?;
        debug!(suspend_close, "connection acquired");
    }

    let auto_commit = ctx.auto_commit();
    let isolation_level = ctx.isolation_level();
    let with_transaction = ctx.with_transaction();
    let conn = ctx
        .connection_mut()
        .ok_or_else(|| SqlMapperError::IllegalState("no connection bound".into()))?;
    conn.settle();
    if with_transaction && !conn.transaction_open() {
        let begun = conn.begin(auto_commit, isolation_level).await;
        if let Err(err) = begun {
            if let Some(conn) = ctx.clear_connection()
                && let Err(close_err) = conn.guard().close().await
            {
                warn!("closing connection after failed begin also failed: {close_err}");
            }
            return Err(err);
        }
    }
    ctx.connection()
        .ok_or_else(|| SqlMapperError::IllegalState("no connection bound".into()))
}
