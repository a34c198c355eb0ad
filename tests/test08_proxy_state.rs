mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{MockConnection, MockFactory};
use reactive_sql_mapper::connection::{acquire_connection, close_connection};
use reactive_sql_mapper::prelude::*;

fn config(mock: &MockFactory) -> Result<Configuration, SqlMapperError> {
    mock.script_update("insert into blog", 1);
    Configuration::builder(Arc::new(mock.clone()))
        .statement(MappedStatement::insert(
            "insertBlog",
            "insert into blog (title) values (#{title})",
        ))
        .build()
}

fn blog() -> ParameterObject {
    ParameterObject::from(Record::new().with("title", "t"))
}

#[tokio::test]
async fn proxy_walks_through_commit_defer_and_close() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut ctx = ExecutionContext::new(false, None);

    let conn = acquire_connection(&mut ctx, &mock).await?;
    assert_eq!(conn.state(), ConnectionState::Active);
    assert!(conn.suspend_close());
    assert!(conn.transaction_open());
    assert_eq!(mock.log.begins(), 1);

    ctx.force_commit = true;
    close_connection(&mut ctx).await?;
    assert_eq!(mock.log.commits(), 1);
    let conn = ctx.connection().expect("still bound after commit");
    assert_eq!(conn.state(), ConnectionState::Active);
    assert!(!conn.transaction_open());

    // a plain close inside a transaction is deferred
    close_connection(&mut ctx).await?;
    assert!(ctx.connection().is_some());
    assert_eq!(mock.log.closes(), 0);

    acquire_connection(&mut ctx, &mock).await?;
    assert_eq!(mock.log.connections(), 1);
    assert_eq!(mock.log.begins(), 2);

    ctx.require_close = true;
    close_connection(&mut ctx).await?;
    assert!(ctx.connection().is_none());
    assert_eq!(mock.log.closes(), 1);
    assert_eq!(mock.log.commits(), 1);
    assert_eq!(mock.log.rollbacks(), 0);
    Ok(())
}

#[tokio::test]
async fn auto_commit_contexts_close_right_away() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut ctx = ExecutionContext::new(true, None);

    let conn = acquire_connection(&mut ctx, &mock).await?;
    assert!(!conn.suspend_close());
    assert!(!conn.transaction_open());
    close_connection(&mut ctx).await?;

    assert!(ctx.connection().is_none());
    assert_eq!(mock.log.begins(), 0);
    assert_eq!(mock.log.closes(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_commit_closes_and_unbinds_the_connection() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = SessionFactory::new(config(&mock)?).open_session();
    session.insert("insertBlog", &mut blog()).await?;

    mock.log.fail_commit.store(true, Ordering::SeqCst);
    let err = session.commit(false).await.expect_err("commit must fail");
    assert!(
        matches!(err, SqlMapperError::TransactionStateError { action: "commit", .. }),
        "unexpected error: {err}"
    );
    assert_eq!(mock.log.closes(), 1);
    assert!(session.context().is_some_and(|ctx| ctx.connection().is_none()));
    assert!(!session.is_dirty());

    // the session stays usable on a fresh connection
    mock.log.fail_commit.store(false, Ordering::SeqCst);
    session.insert("insertBlog", &mut blog()).await?;
    assert_eq!(mock.log.connections(), 2);
    session.commit(false).await?;
    session.close().await?;
    assert_eq!(mock.log.closes(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_begin_closes_and_unbinds_the_connection() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = SessionFactory::new(config(&mock)?).open_session();

    mock.log.fail_begin.store(true, Ordering::SeqCst);
    assert!(session.insert("insertBlog", &mut blog()).await.is_err());
    assert_eq!(mock.log.closes(), 1);
    assert!(session.context().is_some_and(|ctx| ctx.connection().is_none()));
    assert!(mock.log.statements().is_empty());

    session.close().await?;
    assert_eq!(mock.log.closes(), 1);
    Ok(())
}

#[tokio::test]
async fn executor_requires_an_initialized_scope() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let config = Arc::new(config(&mock)?);
    let statement = config
        .statements()
        .statement("insertBlog")
        .expect("registered");
    let executor = StatementExecutor::new(Arc::clone(&config));

    let mut scope = ContextScope::new();
    let err = executor
        .update(&mut scope, &statement, &mut blog())
        .await
        .expect_err("no context");
    assert!(matches!(err, SqlMapperError::ContextMissing));
    assert_eq!(mock.log.connections(), 0);
    Ok(())
}

#[tokio::test]
async fn closed_proxy_rejects_further_use() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let guard = ConnectionCloseGuard::new(MockConnection::standalone(Arc::clone(&mock.log)));
    let mut conn = TransactionAwareConnection::new(Arc::clone(&guard), false);
    assert_eq!(conn.state(), ConnectionState::Active);

    guard.close().await?;
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(matches!(
        conn.create_statement("select 1"),
        Err(SqlMapperError::IllegalState(_))
    ));
    assert!(matches!(
        conn.begin(false, None).await,
        Err(SqlMapperError::IllegalState(_))
    ));
    assert_eq!(mock.log.begins(), 0);
    Ok(())
}

#[test]
fn configuration_rejects_duplicates_and_mixed_sources() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let duplicate = Configuration::builder(Arc::new(mock.clone()))
        .statement(MappedStatement::select("blogs", "select * from blog"))
        .statement(MappedStatement::select("blogs", "select id from blog"))
        .build();
    assert!(matches!(duplicate, Err(SqlMapperError::ConfigError(_))));

    let provider = Arc::new(StatementRegistry::new());
    let mixed = Configuration::builder(Arc::new(mock))
        .statement_provider(provider)
        .statement(MappedStatement::select("blogs", "select * from blog"))
        .build();
    assert!(matches!(mixed, Err(SqlMapperError::ConfigError(_))));
    Ok(())
}
