use tracing::debug;

use crate::driver::BindValue;
use crate::types::DbValue;

pub(crate) fn preparing(statement: &str, sql: &str) {
    debug!(target: "reactive_sql_mapper::statement", statement, "==>  Preparing: {sql}");
}

pub(crate) fn parameters(statement: &str, values: &[BindValue]) {
    if !tracing::enabled!(target: "reactive_sql_mapper::statement", tracing::Level::DEBUG) {
        return;
    }
    let rendered = values.iter().map(describe).collect::<Vec<_>>().join(", ");
    debug!(target: "reactive_sql_mapper::statement", statement, "==> Parameters: {rendered}");
}

pub(crate) fn total(statement: &str, total: usize) {
    debug!(target: "reactive_sql_mapper::statement", statement, "<==      Total: {total}");
}

pub(crate) fn updates(statement: &str, updates: u64) {
    debug!(target: "reactive_sql_mapper::statement", statement, "<==    Updates: {updates}");
}

fn describe(value: &BindValue) -> String {
    match value {
        BindValue::Value(value) => describe_value(value),
        BindValue::Null(sql_type) => format!("null({sql_type:?})"),
        BindValue::Out(sql_type) => format!("OUT({sql_type:?})"),
        BindValue::InOut(value, sql_type) => {
            format!("{}/INOUT({sql_type:?})", describe_value(value))
        }
    }
}

fn describe_value(value: &DbValue) -> String {
    match value {
        DbValue::Null => "null".to_string(),
        DbValue::Bool(b) => format!("{b}(Bool)"),
        DbValue::Int(i) => format!("{i}(Int)"),
        DbValue::Float(f) => format!("{f}(Float)"),
        DbValue::Text(s) => format!("{s}(Text)"),
        DbValue::Blob(bytes) => format!("<{} bytes>(Blob)", bytes.len()),
        DbValue::Timestamp(ts) => format!("{ts}(Timestamp)"),
    }
}
