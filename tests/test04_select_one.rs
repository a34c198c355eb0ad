mod common;

use std::sync::Arc;

use common::{MockFactory, int, text, wait_for};
use reactive_sql_mapper::prelude::*;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Author {
    id: i64,
    name: String,
}

fn factory(mock: &MockFactory) -> Result<SessionFactory, SqlMapperError> {
    mock.script_rows(
        "where name = ?1",
        &["id", "name"],
        vec![vec![int(1), text("ann")], vec![int(2), text("ann")]],
    );
    mock.script_rows("where id = ?1", &["id", "name"], vec![vec![int(1), text("ann")]]);
    mock.script_rows(
        "from author order by id",
        &["id", "name"],
        (1..=50).map(|i| vec![int(i), text("bulk")]).collect(),
    );
    mock.script_rows("where 1 = 0", &["id", "name"], Vec::new());
    let config = Configuration::builder(Arc::new(mock.clone()))
        .settings(Settings {
            auto_commit: true,
            ..Settings::default()
        })
        .statement(MappedStatement::select(
            "authorsByName",
            "select id, name from author where name = #{name}",
        ))
        .statement(MappedStatement::select(
            "authorById",
            "select id, name from author where id = #{id}",
        ))
        .statement(MappedStatement::select(
            "allAuthors",
            "select id, name from author order by id",
        ))
        .statement(MappedStatement::select(
            "noAuthor",
            "select id, name from author where 1 = 0",
        ))
        .build()?;
    Ok(SessionFactory::new(config))
}

#[tokio::test]
async fn more_than_one_result_is_an_error() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock)?.open_session();

    let err = session
        .select_one("authorsByName", Record::new().with("name", "ann"))
        .await
        .unwrap_err();
    match err {
        SqlMapperError::TooManyResults { statement, found } => {
            assert_eq!(statement, "authorsByName");
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        wait_for(|| mock.log.closes() == 1).await,
        "connection is released after the error"
    );
    session.close().await
}

#[tokio::test]
async fn too_many_results_stop_reading_at_the_second_row() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock)?.open_session();

    let err = session.select_one("allAuthors", ()).await.unwrap_err();
    assert!(matches!(err, SqlMapperError::TooManyResults { found: 2, .. }));
    assert_eq!(mock.log.rows_pulled(), 2);

    assert!(wait_for(|| mock.log.closes() == 1).await);
    assert!(session.context().is_some_and(|ctx| ctx.connection().is_none()));
    session.close().await?;
    assert_eq!(mock.log.closes(), 1);
    Ok(())
}

#[tokio::test]
async fn zero_or_one_result_is_returned() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock)?.open_session();

    assert_eq!(session.select_one("noAuthor", ()).await?, None);

    let author: Option<Author> = session.select_one_as("authorById", 1).await?;
    assert_eq!(
        author,
        Some(Author {
            id: 1,
            name: "ann".into()
        })
    );
    assert_eq!(
        mock.log.last_bindings(),
        vec![BindValue::Value(DbValue::Int(1))]
    );
    session.close().await
}
