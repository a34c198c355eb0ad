//! A scripted in-memory driver that records every call made against it.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream;
use reactive_sql_mapper::driver::{ResultStream, RowStream};
use reactive_sql_mapper::prelude::*;
use reactive_sql_mapper::results::Columns;

#[derive(Debug, Default)]
pub struct DriverLog {
    pub connections_created: AtomicUsize,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub closes: AtomicUsize,
    pub rows_pulled: AtomicUsize,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    pub statements: Mutex<Vec<String>>,
    pub bindings: Mutex<Vec<Vec<BindValue>>>,
}

impl DriverLog {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections_created.load(Ordering::SeqCst)
    }

    pub fn rows_pulled(&self) -> usize {
        self.rows_pulled.load(Ordering::SeqCst)
    }

    pub fn last_bindings(&self) -> Vec<BindValue> {
        self.bindings.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<DbValue>>,
    },
    Updated(u64),
}

type Scripts = Arc<Mutex<Vec<(String, Scripted)>>>;

#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    pub log: Arc<DriverLog>,
    scripts: Scripts,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements whose SQL contains `fragment` return these rows.
    pub fn script_rows(&self, fragment: &str, columns: &[&str], rows: Vec<Vec<DbValue>>) {
        self.scripts.lock().unwrap().push((
            fragment.to_string(),
            Scripted::Rows {
                columns: columns.iter().map(ToString::to_string).collect(),
                rows,
            },
        ));
    }

    pub fn script_update(&self, fragment: &str, count: u64) {
        self.scripts
            .lock()
            .unwrap()
            .push((fragment.to_string(), Scripted::Updated(count)));
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    async fn create(&self) -> Result<Arc<dyn DriverConnection>, SqlMapperError> {
        self.log.connections_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            log: Arc::clone(&self.log),
            scripts: Arc::clone(&self.scripts),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MockConnection {
    log: Arc<DriverLog>,
    scripts: Scripts,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn standalone(log: Arc<DriverLog>) -> Arc<dyn DriverConnection> {
        Arc::new(MockConnection {
            log,
            scripts: Scripts::default(),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl DriverConnection for MockConnection {
    fn create_statement(&self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlMapperError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SqlMapperError::IllegalState("mock connection closed".into()));
        }
        Ok(Box::new(MockStatement {
            log: Arc::clone(&self.log),
            scripts: Arc::clone(&self.scripts),
            sql: sql.to_string(),
            params: Vec::new(),
            returning: Vec::new(),
        }))
    }

    async fn begin_transaction(&self) -> Result<(), SqlMapperError> {
        if self.log.fail_begin.load(Ordering::SeqCst) {
            return Err(SqlMapperError::ExecutionError("begin refused".into()));
        }
        self.log.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<(), SqlMapperError> {
        self.log.commits.fetch_add(1, Ordering::SeqCst);
        if self.log.fail_commit.load(Ordering::SeqCst) {
            return Err(SqlMapperError::ExecutionError("commit refused".into()));
        }
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<(), SqlMapperError> {
        self.log.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_auto_commit(&self, _auto_commit: bool) -> Result<(), SqlMapperError> {
        Ok(())
    }

    async fn set_isolation_level(&self, _level: IsolationLevel) -> Result<(), SqlMapperError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SqlMapperError> {
        self.closed.store(true, Ordering::SeqCst);
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockStatement {
    log: Arc<DriverLog>,
    scripts: Scripts,
    sql: String,
    params: Vec<BindValue>,
    returning: Vec<String>,
}

impl DriverStatement for MockStatement {
    fn bind(&mut self, index: usize, value: BindValue) -> Result<(), SqlMapperError> {
        if self.params.len() <= index {
            self.params.resize(index + 1, BindValue::Null(SqlType::Other));
        }
        self.params[index] = value;
        Ok(())
    }

    fn return_generated_values(&mut self, columns: &[String]) {
        self.returning = columns.to_vec();
    }

    fn execute(self: Box<Self>) -> ResultStream {
        let MockStatement {
            log,
            scripts,
            sql,
            params,
            returning,
        } = *self;
        let script = scripts
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, script)| script.clone());
        let sql = if returning.is_empty() {
            sql
        } else {
            format!("{sql} RETURNING {}", returning.join(", "))
        };
        log.statements.lock().unwrap().push(sql);
        log.bindings.lock().unwrap().push(params);
        let result: Box<dyn DriverResult> = Box::new(MockResult { log, script });
        stream::once(async move { Ok(result) }).boxed()
    }
}

struct MockResult {
    log: Arc<DriverLog>,
    script: Option<Scripted>,
}

impl DriverResult for MockResult {
    fn rows_updated(self: Box<Self>) -> BoxFuture<'static, Result<u64, SqlMapperError>> {
        let count = match self.script {
            Some(Scripted::Updated(count)) => count,
            Some(Scripted::Rows { rows, .. }) => rows.len() as u64,
            None => 0,
        };
        Box::pin(async move { Ok(count) })
    }

    fn rows(self: Box<Self>) -> RowStream {
        let (columns, rows) = match self.script {
            Some(Scripted::Rows { columns, rows }) => (columns, rows),
            _ => (Vec::new(), Vec::new()),
        };
        let columns = Columns::new(columns);
        let log = self.log;
        stream::iter(rows)
            .map(move |values| {
                log.rows_pulled.fetch_add(1, Ordering::SeqCst);
                Ok(DbRow::new(Arc::clone(&columns), values))
            })
            .boxed()
    }
}

pub fn int(value: i64) -> DbValue {
    DbValue::Int(value)
}

pub fn text(value: &str) -> DbValue {
    DbValue::Text(value.to_string())
}

/// Poll `check` until it holds, for background releases running on the runtime.
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
