mod common;

use std::sync::Arc;

use common::{MockFactory, int, text};
use futures_util::TryStreamExt;
use reactive_sql_mapper::prelude::*;

const BLOG_SQL: &str = "select b.id as blog_id, b.title as blog_title, \
                        p.id as post_id, p.body as post_body \
                        from blog b left join post p on p.blog_id = b.id";

fn blog_map() -> ResultMap {
    ResultMap::new("blog")
        .id("id", "blog_id")
        .column("title", "blog_title")
        .collection(
            "posts",
            ResultMap::new("post").id("id", "post_id").column("body", "post_body"),
        )
}

/// One row per child, or a single row with NULL child columns for a childless parent.
fn blog_rows(child_counts: &[usize]) -> Vec<Vec<DbValue>> {
    let mut rows = Vec::new();
    let mut next_post = 100;
    for (i, &children) in child_counts.iter().enumerate() {
        let blog_id = i as i64 + 1;
        let title = text(&format!("blog {blog_id}"));
        if children == 0 {
            rows.push(vec![int(blog_id), title.clone(), DbValue::Null, DbValue::Null]);
        }
        for _ in 0..children {
            next_post += 1;
            rows.push(vec![
                int(blog_id),
                title.clone(),
                int(next_post),
                text(&format!("post {next_post}")),
            ]);
        }
    }
    rows
}

fn factory(
    mock: &MockFactory,
    rows: Vec<Vec<DbValue>>,
    ordered: bool,
) -> Result<SessionFactory, SqlMapperError> {
    mock.script_rows(
        "from blog b left join post p",
        &["blog_id", "blog_title", "post_id", "post_body"],
        rows,
    );
    let config = Configuration::builder(Arc::new(mock.clone()))
        .statement(
            MappedStatement::select("selectBlogsWithPosts", BLOG_SQL)
                .result_map(blog_map())
                .result_ordered(ordered),
        )
        .build()?;
    Ok(SessionFactory::new(config))
}

#[tokio::test]
async fn ordered_grouping_reads_one_row_past_the_first_parent() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock, blog_rows(&[3, 5, 6, 0]), true)?.open_session();

    let blogs: Vec<Record> = session
        .select_list("selectBlogsWithPosts", (), RowBounds::limit(1))
        .try_collect()
        .await?;

    assert_eq!(blogs.len(), 1);
    assert_eq!(blogs[0].value("id"), Some(&SqlValue::Int(1)));
    assert_eq!(blogs[0].list("posts").map(<[Record]>::len), Some(3));
    assert_eq!(mock.log.rows_pulled(), 4);
    session.close().await
}

#[tokio::test]
async fn ordered_grouping_lookahead_holds_for_every_limit() -> Result<(), SqlMapperError> {
    let counts = [3, 5, 6, 0];
    for limit in 1..=counts.len() {
        let mock = MockFactory::new();
        let mut session = factory(&mock, blog_rows(&counts), true)?.open_session();
        let blogs: Vec<Record> = session
            .select_list("selectBlogsWithPosts", (), RowBounds::limit(limit))
            .try_collect()
            .await?;
        assert_eq!(blogs.len(), limit);

        // a childless parent still occupies one row
        let rows_of = |n: usize| counts[..n].iter().map(|&c| c.max(1)).sum::<usize>();
        let total_rows = rows_of(counts.len());
        assert!(mock.log.rows_pulled() <= rows_of(limit) + 1);
        assert_eq!(mock.log.rows_pulled(), (rows_of(limit) + 1).min(total_rows));
        session.close().await?;
    }
    Ok(())
}

#[tokio::test]
async fn childless_parents_get_an_empty_collection() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock, blog_rows(&[2, 0]), true)?.open_session();

    let blogs: Vec<Record> = session
        .select_list("selectBlogsWithPosts", (), RowBounds::default())
        .try_collect()
        .await?;

    assert_eq!(blogs.len(), 2);
    assert_eq!(blogs[0].list("posts").map(<[Record]>::len), Some(2));
    assert_eq!(blogs[1].list("posts").map(<[Record]>::len), Some(0));
    assert_eq!(blogs[1].value("title"), Some(&SqlValue::from("blog 2")));
    session.close().await
}

/// Parents 1, 2 and 3 with 3, 2 and 0 children, rows not grouped by parent.
fn interleaved_rows() -> Vec<Vec<DbValue>> {
    vec![
        vec![int(1), text("a"), int(11), text("a1")],
        vec![int(2), text("b"), int(21), text("b1")],
        vec![int(1), text("a"), int(12), text("a2")],
        vec![int(3), text("c"), DbValue::Null, DbValue::Null],
        vec![int(2), text("b"), int(22), text("b2")],
        vec![int(1), text("a"), int(13), text("a3")],
    ]
}

async fn unordered_blogs(bounds: RowBounds) -> Result<(Vec<Record>, usize), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock, interleaved_rows(), false)?.open_session();
    let blogs: Vec<Record> = session
        .select_list("selectBlogsWithPosts", (), bounds)
        .try_collect()
        .await?;
    session.close().await?;
    Ok((blogs, mock.log.rows_pulled()))
}

#[tokio::test]
async fn unordered_grouping_under_bounds_emits_complete_parents() -> Result<(), SqlMapperError> {
    let (all, _) = unordered_blogs(RowBounds::default()).await?;

    let (first, pulled) = unordered_blogs(RowBounds::limit(1)).await?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0], all[0]);
    assert_eq!(first[0].list("posts").map(<[Record]>::len), Some(3));
    assert_eq!(pulled, interleaved_rows().len());

    let (second, pulled) = unordered_blogs(RowBounds::new(1, 1)).await?;
    assert_eq!(second, vec![all[1].clone()]);
    assert_eq!(second[0].list("posts").map(<[Record]>::len), Some(2));
    assert_eq!(pulled, interleaved_rows().len());
    Ok(())
}

#[tokio::test]
async fn unordered_grouping_merges_interleaved_rows() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    let mut session = factory(&mock, interleaved_rows(), false)?.open_session();

    let blogs: Vec<Record> = session
        .select_list("selectBlogsWithPosts", (), RowBounds::default())
        .try_collect()
        .await?;

    let ids: Vec<_> = blogs.iter().filter_map(|b| b.value("id").cloned()).collect();
    assert_eq!(ids, vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]);
    let post_counts: Vec<_> = blogs
        .iter()
        .map(|b| b.list("posts").map_or(0, <[Record]>::len))
        .collect();
    assert_eq!(post_counts, vec![3, 2, 0]);
    let first_bodies: Vec<_> = blogs[0]
        .list("posts")
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p.value("body").cloned())
        .collect();
    assert_eq!(
        first_bodies,
        vec![SqlValue::from("a1"), SqlValue::from("a2"), SqlValue::from("a3")]
    );
    assert_eq!(mock.log.rows_pulled(), 6);
    session.close().await
}

#[tokio::test]
async fn flat_results_respect_offset_and_limit() -> Result<(), SqlMapperError> {
    let mock = MockFactory::new();
    mock.script_rows(
        "select id from numbers",
        &["id"],
        (1..=10).map(|i| vec![int(i)]).collect(),
    );
    let config = Configuration::builder(Arc::new(mock.clone()))
        .statement(MappedStatement::select("numbers", "select id from numbers"))
        .build()?;
    let mut session = SessionFactory::new(config).open_session();

    let numbers: Vec<Record> = session
        .select_list("numbers", (), RowBounds::new(2, 3))
        .try_collect()
        .await?;

    let ids: Vec<_> = numbers.iter().filter_map(|r| r.value("id").cloned()).collect();
    assert_eq!(ids, vec![SqlValue::Int(3), SqlValue::Int(4), SqlValue::Int(5)]);
    assert_eq!(mock.log.rows_pulled(), 5);
    session.close().await
}
