mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{DriverLog, MockConnection};
use futures_util::future::{BoxFuture, join_all};
use reactive_sql_mapper::prelude::*;

type Released = BoxFuture<'static, Result<(), SqlMapperError>>;

#[tokio::test]
async fn close_reaches_the_driver_once_under_concurrency() -> Result<(), SqlMapperError> {
    let log = Arc::new(DriverLog::default());
    let guard = ConnectionCloseGuard::new(MockConnection::standalone(Arc::clone(&log)));

    let closers = (0..32).map(|_| {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move { guard.close().await })
    });
    for joined in join_all(closers).await {
        joined.expect("close task panicked")?;
    }

    assert!(guard.is_closed());
    assert_eq!(log.closes(), 1);
    Ok(())
}

#[tokio::test]
async fn repeated_close_is_a_no_op() -> Result<(), SqlMapperError> {
    let log = Arc::new(DriverLog::default());
    let guard = ConnectionCloseGuard::new(MockConnection::standalone(Arc::clone(&log)));
    for _ in 0..5 {
        guard.close().await?;
    }
    assert_eq!(log.closes(), 1);
    assert!(matches!(guard.target(), Err(SqlMapperError::IllegalState(_))));
    Ok(())
}

#[tokio::test]
async fn custom_release_runs_instead_of_close() -> Result<(), SqlMapperError> {
    let log = Arc::new(DriverLog::default());
    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    let guard = ConnectionCloseGuard::with_release(
        MockConnection::standalone(Arc::clone(&log)),
        Arc::new(
            move |_conn: Arc<dyn DriverConnection>| -> Released {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            },
        ),
    );

    guard.close().await?;
    guard.close().await?;

    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(log.closes(), 0);
    Ok(())
}
