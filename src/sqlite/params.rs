use rusqlite::types::Value;

use crate::driver::BindValue;
use crate::error::SqlMapperError;
use crate::types::DbValue;

/// Convert a driver value to a rusqlite `Value`.
#[must_use]
pub fn db_value_to_sqlite_value(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Bool(b) => Value::Integer(i64::from(b)),
        DbValue::Int(i) => Value::Integer(i),
        DbValue::Float(f) => Value::Real(f),
        DbValue::Text(s) => Value::Text(s),
        DbValue::Blob(bytes) => Value::Blob(bytes),
        DbValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
    }
}

/// Convert one binding. `SQLite` has no OUT parameters.
///
/// # Errors
///
/// Returns `SqlMapperError::Unimplemented` for OUT and INOUT bindings.
pub fn bind_value_to_sqlite_value(value: BindValue) -> Result<Value, SqlMapperError> {
    match value {
        BindValue::Value(value) => Ok(db_value_to_sqlite_value(value)),
        BindValue::Null(_) => Ok(Value::Null),
        BindValue::Out(_) | BindValue::InOut(..) => Err(SqlMapperError::Unimplemented(
            "SQLite does not support OUT or INOUT parameters".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::types::SqlType;

    #[test]
    fn timestamps_bind_as_text() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(
            db_value_to_sqlite_value(DbValue::Timestamp(ts)),
            Value::Text("2024-03-01 12:30:00".into())
        );
        assert_eq!(db_value_to_sqlite_value(DbValue::Bool(true)), Value::Integer(1));
    }

    #[test]
    fn out_parameters_are_rejected() {
        assert!(bind_value_to_sqlite_value(BindValue::Null(SqlType::Integer)).is_ok());
        assert!(matches!(
            bind_value_to_sqlite_value(BindValue::Out(SqlType::Integer)),
            Err(SqlMapperError::Unimplemented(_))
        ));
    }
}
