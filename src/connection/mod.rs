//! Connection lifecycle: the at-most-once close guard, the transaction-aware proxy and the
//! per-execution lease.

mod guard;
mod lease;
mod proxy;

pub use guard::{ConnectionCloseGuard, ReleaseAction};
pub use lease::ConnectionLease;
pub(crate) use lease::spawn_plan;
pub(crate) use proxy::plan_close;
pub use proxy::{ConnectionState, TransactionAwareConnection, acquire_connection, close_connection};
