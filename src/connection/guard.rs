use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use tracing::trace;

use crate::driver::DriverConnection;
use crate::error::SqlMapperError;

/// What runs when a guarded connection is released.
pub type ReleaseAction = Arc<
    dyn Fn(Arc<dyn DriverConnection>) -> BoxFuture<'static, Result<(), SqlMapperError>>
        + Send
        + Sync,
>;

/// Wraps a raw connection so that its release runs at most once.
///
/// ```rust
/// # use std::sync::Arc;
/// # use reactive_sql_mapper::prelude::*;
/// # async fn demo(raw: Arc<dyn DriverConnection>) -> Result<(), SqlMapperError> {
/// let guard = ConnectionCloseGuard::new(raw);
/// guard.close().await?;
/// guard.close().await?; // no-op
/// assert!(guard.is_closed());
/// # Ok(())
/// # }
/// ```
pub struct ConnectionCloseGuard {
    target: Arc<dyn DriverConnection>,
    released: AtomicBool,
    release: ReleaseAction,
}

impl ConnectionCloseGuard {
    /// Guard whose release closes the driver connection.
    #[must_use]
    pub fn new(target: Arc<dyn DriverConnection>) -> Arc<Self> {
        Self::with_release(
            target,
            Arc::new(|conn: Arc<dyn DriverConnection>| -> BoxFuture<'static, _> {
                Box::pin(async move { conn.close().await })
            }),
        )
    }

    /// Guard with a custom release, e.g. returning the connection to a pool.
    #[must_use]
    pub fn with_release(target: Arc<dyn DriverConnection>, release: ReleaseAction) -> Arc<Self> {
        Arc::new(Self {
            target,
            released: AtomicBool::new(false),
            release,
        })
    }

    /// The wrapped connection, as long as it has not been released.
    ///
    /// # Errors
    /// Returns `SqlMapperError::IllegalState` after release.
    pub fn target(&self) -> Result<&Arc<dyn DriverConnection>, SqlMapperError> {
        if self.is_closed() {
            return Err(SqlMapperError::IllegalState(
                "connection is already closed".into(),
            ));
        }
        Ok(&self.target)
    }

    /// Diagnostic only; a concurrent `close` may win right after this returns `false`.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the connection. Only the first caller runs the release action; every other call
    /// completes immediately with success.
    ///
    /// # Errors
    /// Propagates the release action's failure to the winning caller.
    pub async fn close(&self) -> Result<(), SqlMapperError> {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("connection already released; close is a no-op");
            return Ok(());
        }
        trace!("releasing connection");
        (self.release)(Arc::clone(&self.target)).await
    }
}

impl fmt::Debug for ConnectionCloseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCloseGuard")
            .field("released", &self.is_closed())
            .finish_non_exhaustive()
    }
}
