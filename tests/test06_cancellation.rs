mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockFactory, int, wait_for};
use futures_util::StreamExt;
use reactive_sql_mapper::prelude::*;

const TOTAL: i64 = 50;

fn factory(mock: &MockFactory, auto_commit: bool) -> Result<SessionFactory, SqlMapperError> {
    mock.script_rows(
        "select n from series",
        &["n"],
        (1..=TOTAL).map(|n| vec![int(n)]).collect(),
    );
    let config = Configuration::builder(Arc::new(mock.clone()))
        .settings(Settings {
            auto_commit,
            ..Settings::default()
        })
        .statement(MappedStatement::select("series", "select n from series"))
        .build()?;
    Ok(SessionFactory::new(config))
}

#[tokio::test]
async fn abandoned_stream_releases_its_connection_once() -> Result<(), SqlMapperError> {
    common::init_tracing();
    let mock = MockFactory::new();
    let mut session = factory(&mock, true)?.open_session();

    {
        let mut rows = session.select_list("series", (), RowBounds::default());
        for _ in 0..3 {
            rows.next().await.expect("row available")?;
        }
    }

    let log = Arc::clone(&mock.log);
    assert!(wait_for(|| log.closes() == 1).await);
    assert!(mock.log.rows_pulled() < TOTAL as usize);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.log.closes(), 1);
    assert!(session.context().and_then(ExecutionContext::connection).is_none());

    session.close().await?;
    assert_eq!(mock.log.closes(), 1);
    Ok(())
}

#[tokio::test]
async fn abandoned_stream_inside_a_transaction_keeps_the_connection() -> Result<(), SqlMapperError>
{
    let mock = MockFactory::new();
    let mut session = factory(&mock, false)?.open_session();

    {
        let mut rows = session.select_list("series", (), RowBounds::default());
        rows.next().await.expect("row available")?;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.log.closes(), 0, "close waits for the end of the session transaction");

    // the same connection serves the next query
    let rows: Vec<_> = session
        .select_list("series", (), RowBounds::limit(5))
        .collect()
        .await;
    assert_eq!(rows.len(), 5);
    assert_eq!(mock.log.connections(), 1);

    session.close().await?;
    assert_eq!(mock.log.closes(), 1);
    Ok(())
}

#[tokio::test]
async fn stream_that_is_never_polled_acquires_nothing() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock, true)?.open_session();
    drop(session.select_list("series", (), RowBounds::default()));
    assert_eq!(mock.log.connections(), 0);
    assert!(mock.log.statements().is_empty());
    session.close().await
}
