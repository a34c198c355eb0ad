//! Per-session execution state, passed explicitly down the async pipeline.

use crate::connection::TransactionAwareConnection;
use crate::error::SqlMapperError;
use crate::types::IsolationLevel;

/// Connection- and transaction-scoped state of one session.
///
/// The flags are plain fields: they are read and written by the session, the executor and the
/// connection proxy, all of which receive the context as `&mut`.
#[derive(Debug)]
pub struct ExecutionContext {
    connection: Option<TransactionAwareConnection>,
    auto_commit: bool,
    isolation_level: Option<IsolationLevel>,
    with_transaction: bool,
    /// An update ran since the last commit or rollback
    pub dirty: bool,
    /// Commit on the next connection close
    pub force_commit: bool,
    /// Roll back on the next connection close
    pub force_rollback: bool,
    /// Really close the connection on the next connection close
    pub require_close: bool,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(auto_commit: bool, isolation_level: Option<IsolationLevel>) -> Self {
        Self {
            connection: None,
            auto_commit,
            isolation_level,
            with_transaction: !auto_commit,
            dirty: false,
            force_commit: false,
            force_rollback: false,
            require_close: false,
        }
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    #[must_use]
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation_level
    }

    /// Connections acquired through this context run inside an explicit transaction.
    #[must_use]
    pub fn with_transaction(&self) -> bool {
        self.with_transaction
    }

    #[must_use]
    pub fn connection(&self) -> Option<&TransactionAwareConnection> {
        self.connection.as_ref()
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut TransactionAwareConnection> {
        self.connection.as_mut()
    }

    /// Bind a connection to this context.
    ///
    /// # Errors
    /// Returns `SqlMapperError::IllegalState` if a connection is already bound.
    pub fn bind_connection(
        &mut self,
        connection: TransactionAwareConnection,
    ) -> Result<(), SqlMapperError> {
        if self.connection.is_some() {
            return Err(SqlMapperError::IllegalState(
                "a connection is already bound to this execution context".into(),
            ));
        }
        self.connection = Some(connection);
        Ok(())
    }

    /// Unbind the connection without closing it.
    pub fn clear_connection(&mut self) -> Option<TransactionAwareConnection> {
        self.connection.take()
    }

    /// Whether a commit or rollback has work to do.
    #[must_use]
    pub fn is_commit_or_rollback_required(&self, force: bool) -> bool {
        (!self.auto_commit && self.dirty) || force
    }
}

/// Holder of the context of one session scope.
///
/// Installed lazily by the first session operation and torn down when the session closes.
#[derive(Debug, Default)]
pub struct ContextScope {
    context: Option<ExecutionContext>,
}

impl ContextScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// The context attached to this scope.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ContextMissing` if the scope was never initialized.
    pub fn current(&mut self) -> Result<&mut ExecutionContext, SqlMapperError> {
        self.context.as_mut().ok_or(SqlMapperError::ContextMissing)
    }

    #[must_use]
    pub fn peek(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    /// Install a context created by `create`, or, when one exists, hand it to `configure`.
    pub fn initialize<C, F>(&mut self, create: C, configure: F) -> &mut ExecutionContext
    where
        C: FnOnce() -> ExecutionContext,
        F: FnOnce(&mut ExecutionContext),
    {
        if let Some(context) = self.context.as_mut() {
            configure(context);
        }
        self.context.get_or_insert_with(create)
    }

    pub fn teardown(&mut self) -> Option<ExecutionContext> {
        self.context.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_requires_initialization() {
        let mut scope = ContextScope::new();
        assert!(matches!(
            scope.current(),
            Err(SqlMapperError::ContextMissing)
        ));
        scope.initialize(|| ExecutionContext::new(false, None), |_| {});
        assert!(scope.current().is_ok());
        assert!(scope.teardown().is_some());
        assert!(scope.current().is_err());
    }

    #[test]
    fn initialize_keeps_the_existing_context() {
        let mut scope = ContextScope::new();
        scope.initialize(|| ExecutionContext::new(false, None), |_| {});
        scope.current().unwrap().dirty = true;

        let mut configured = false;
        let context = scope.initialize(
            || panic!("context must not be recreated"),
            |ctx| {
                configured = true;
                ctx.force_commit = true;
            },
        );
        assert!(context.dirty);
        assert!(context.force_commit);
        assert!(configured);
    }

    #[test]
    fn commit_is_required_only_for_dirty_transactions_or_when_forced() {
        let mut ctx = ExecutionContext::new(false, None);
        assert!(!ctx.is_commit_or_rollback_required(false));
        assert!(ctx.is_commit_or_rollback_required(true));
        ctx.dirty = true;
        assert!(ctx.is_commit_or_rollback_required(false));

        let mut auto = ExecutionContext::new(true, None);
        auto.dirty = true;
        assert!(!auto.with_transaction());
        assert!(!auto.is_commit_or_rollback_required(false));
    }
}
