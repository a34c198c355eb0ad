use tokio::runtime::Handle;
use tracing::warn;

use super::proxy::{
    ClosePlan, TransactionAwareConnection, acquire_connection, close_connection, plan_close,
};
use crate::context::ExecutionContext;
use crate::driver::ConnectionFactory;
use crate::error::SqlMapperError;

/// The connection of one statement execution.
///
/// Call [`ConnectionLease::release`] when the execution ends. A lease that is dropped instead
/// (the future or stream holding it was cancelled) plans the close right away and runs the
/// driver calls on the current tokio runtime.
pub struct ConnectionLease<'c> {
    ctx: &'c mut ExecutionContext,
    released: bool,
}

impl<'c> ConnectionLease<'c> {
    /// # Errors
    /// See [`acquire_connection`].
    pub async fn acquire(
        ctx: &'c mut ExecutionContext,
        factory: &dyn ConnectionFactory,
    ) -> Result<Self, SqlMapperError> {
        acquire_connection(ctx, factory).await?;
        Ok(Self {
            ctx,
            released: false,
        })
    }

    /// # Errors
    /// Returns `SqlMapperError::IllegalState` if the connection was unbound under the lease.
    pub fn connection(&self) -> Result<&TransactionAwareConnection, SqlMapperError> {
        self.ctx
            .connection()
            .ok_or_else(|| SqlMapperError::IllegalState("leased connection is gone".into()))
    }

    pub fn context(&mut self) -> &mut ExecutionContext {
        self.ctx
    }

    /// Close the leased connection the way the context dictates.
    ///
    /// # Errors
    /// See [`close_connection`].
    pub async fn release(mut self) -> Result<(), SqlMapperError> {
        self.released = true;
        close_connection(self.ctx).await
    }
}

impl Drop for ConnectionLease<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        spawn_plan(plan_close(self.ctx), "cancelled statement");
    }
}

/// Run a close plan in the background; used where no caller is left to await it.
pub(crate) fn spawn_plan(plan: ClosePlan, origin: &'static str) {
    if plan.is_noop() {
        return;
    }
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(err) = plan.execute().await {
                    warn!(origin, "background connection release failed: {err}");
                }
            });
        }
        Err(_) => {
            warn!(origin, "no tokio runtime available; connection release skipped");
        }
    }
}
