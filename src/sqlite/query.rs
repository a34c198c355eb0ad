use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SqlMapperError;
use crate::results::{Columns, DbRow};
use crate::types::DbValue;

/// Extract a `DbValue` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlMapperError` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<DbValue, SqlMapperError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => DbValue::Null,
        Value::Integer(i) => DbValue::Int(i),
        Value::Real(f) => DbValue::Float(f),
        Value::Text(s) => DbValue::Text(s),
        Value::Blob(b) => DbValue::Blob(b),
    })
}

/// Run a query on the worker thread and push its rows into `rows` one at a time.
///
/// Blocks while the channel is full. Stops early, without error, once the receiver is gone.
pub(crate) fn send_rows(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    rows: &mpsc::Sender<Result<DbRow, SqlMapperError>>,
) -> Result<(), SqlMapperError> {
    let mut stmt = conn.prepare(sql)?;
    let columns = Columns::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );

    let mut cursor = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = cursor.next()? {
        let values = (0..columns.len())
            .map(|i| sqlite_extract_value_sync(row, i))
            .collect::<Result<Vec<_>, _>>()?;
        if rows
            .blocking_send(Ok(DbRow::new(Arc::clone(&columns), values)))
            .is_err()
        {
            debug!("row receiver dropped; abandoning SQLite cursor");
            break;
        }
    }
    Ok(())
}
