use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tokio::sync::{mpsc as async_mpsc, oneshot};

use crate::error::SqlMapperError;
use crate::results::DbRow;

use super::config::SqliteOptions;
use super::query::send_rows;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type RowReceiver = async_mpsc::Receiver<Result<DbRow, SqlMapperError>>;

/// Owns one `rusqlite::Connection` on a dedicated thread.
///
/// Commands run strictly in order, so a query's rows are fully sent (or abandoned) before the
/// next command starts.
pub(crate) struct SqliteWorker {
    sender: Sender<Command>,
    id: u64,
}

impl SqliteWorker {
    pub(crate) async fn spawn(options: &SqliteOptions) -> Result<Self, SqlMapperError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        let options = options.clone();

        // The worker never enters the runtime: `blocking_send` panics inside one.
        thread::Builder::new()
            .name(format!("sqlite-worker-{id}"))
            .spawn(move || match open_connection(&options) {
                Ok(conn) => {
                    let _ = ready_tx.send(Ok(()));
                    run_sqlite_worker(conn, &receiver);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|err| {
                SqlMapperError::ConnectionError(format!(
                    "failed to spawn SQLite worker thread: {err}"
                ))
            })?;

        ready_rx.await.map_err(|_| {
            SqlMapperError::ConnectionError("SQLite worker exited before opening".into())
        })??;
        Ok(Self { sender, id })
    }

    fn send_command(&self, command: Command) -> Result<(), SqlMapperError> {
        self.sender
            .send(command)
            .map_err(|_| SqlMapperError::ConnectionError("SQLite worker closed".into()))
    }

    async fn request<T>(
        &self,
        action: &str,
        command: impl FnOnce(oneshot::Sender<Result<T, SqlMapperError>>) -> Command,
    ) -> Result<T, SqlMapperError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(command(tx))?;
        rx.await.map_err(|_| {
            SqlMapperError::ConnectionError(format!("SQLite worker dropped while {action}"))
        })?
    }

    pub(crate) async fn execute_batch(&self, sql: String) -> Result<(), SqlMapperError> {
        self.request("executing batch", |respond_to| Command::ExecuteBatch {
            sql,
            respond_to,
        })
        .await
    }

    pub(crate) async fn execute(
        &self,
        sql: String,
        params: Vec<Value>,
    ) -> Result<usize, SqlMapperError> {
        self.request("executing statement", |respond_to| Command::Execute {
            sql,
            params,
            respond_to,
        })
        .await
    }

    /// Start a query; rows arrive on the returned channel as the worker produces them.
    pub(crate) fn query(
        &self,
        sql: String,
        params: Vec<Value>,
        buffer: usize,
    ) -> Result<RowReceiver, SqlMapperError> {
        let (rows, receiver) = async_mpsc::channel(buffer.max(1));
        self.send_command(Command::Query { sql, params, rows })?;
        Ok(receiver)
    }

    /// Commit or roll back the open transaction; does nothing when none is open.
    pub(crate) async fn end_transaction(&self, commit: bool) -> Result<(), SqlMapperError> {
        self.request("ending transaction", |respond_to| Command::EndTransaction {
            commit,
            respond_to,
        })
        .await
    }

    /// Close the connection and stop the thread.
    pub(crate) async fn close(&self) -> Result<(), SqlMapperError> {
        self.request("closing", |respond_to| Command::Close { respond_to })
            .await
    }
}

impl fmt::Debug for SqliteWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteWorker").field("id", &self.id).finish()
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

enum Command {
    ExecuteBatch {
        sql: String,
        respond_to: oneshot::Sender<Result<(), SqlMapperError>>,
    },
    Execute {
        sql: String,
        params: Vec<Value>,
        respond_to: oneshot::Sender<Result<usize, SqlMapperError>>,
    },
    Query {
        sql: String,
        params: Vec<Value>,
        rows: async_mpsc::Sender<Result<DbRow, SqlMapperError>>,
    },
    EndTransaction {
        commit: bool,
        respond_to: oneshot::Sender<Result<(), SqlMapperError>>,
    },
    Close {
        respond_to: oneshot::Sender<Result<(), SqlMapperError>>,
    },
    Shutdown,
}

fn open_connection(options: &SqliteOptions) -> Result<Connection, SqlMapperError> {
    let conn = Connection::open(&options.db_path)?;
    if let Some(timeout) = options.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    Ok(conn)
}

fn run_sqlite_worker(conn: Connection, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::ExecuteBatch { sql, respond_to } => {
                let outcome = conn.execute_batch(&sql).map_err(SqlMapperError::from);
                let _ = respond_to.send(outcome);
            }
            Command::Execute {
                sql,
                params,
                respond_to,
            } => {
                let outcome = conn
                    .prepare(&sql)
                    .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
                    .map_err(SqlMapperError::from);
                let _ = respond_to.send(outcome);
            }
            Command::Query { sql, params, rows } => {
                if let Err(err) = send_rows(&conn, &sql, &params, &rows) {
                    let _ = rows.blocking_send(Err(err));
                }
            }
            Command::EndTransaction { commit, respond_to } => {
                let outcome = if conn.is_autocommit() {
                    Ok(())
                } else if commit {
                    conn.execute_batch("COMMIT").map_err(SqlMapperError::from)
                } else {
                    conn.execute_batch("ROLLBACK").map_err(SqlMapperError::from)
                };
                let _ = respond_to.send(outcome);
            }
            Command::Close { respond_to } => {
                let outcome = conn.close().map_err(|(_, err)| SqlMapperError::from(err));
                let _ = respond_to.send(outcome);
                return;
            }
            Command::Shutdown => break,
        }
    }
}
