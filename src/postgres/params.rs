use std::error::Error;

use chrono::{NaiveDate, NaiveTime};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::driver::BindValue;
use crate::error::SqlMapperError;
use crate::types::DbValue;

/// Convert one binding. OUT parameters need a procedure call, which this driver does not issue.
///
/// # Errors
/// Returns `SqlMapperError::Unimplemented` for OUT bindings.
pub fn bind_value_to_postgres(value: BindValue) -> Result<DbValue, SqlMapperError> {
    match value {
        BindValue::Value(value) | BindValue::InOut(value, _) => Ok(value),
        BindValue::Null(_) => Ok(DbValue::Null),
        BindValue::Out(_) => Err(SqlMapperError::Unimplemented(
            "Postgres OUT parameters".into(),
        )),
    }
}

impl ToSql for DbValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            DbValue::Null => Ok(IsNull::Yes),
            DbValue::Bool(b) => b.to_sql(ty, out),
            // narrow to the column's width
            DbValue::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                #[allow(clippy::cast_precision_loss)]
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            DbValue::Float(f) => match *ty {
                #[allow(clippy::cast_possible_truncation)]
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            DbValue::Text(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
                }
                Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
                Type::TIME => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")?.to_sql(ty, out),
                _ => s.to_sql(ty, out),
            },
            DbValue::Blob(bytes) => bytes.to_sql(ty, out),
            DbValue::Timestamp(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // mismatches surface from to_sql with the concrete type
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_narrow_to_column_width() {
        let mut out = bytes::BytesMut::new();
        DbValue::Int(7).to_sql(&Type::INT2, &mut out).unwrap();
        assert_eq!(&out[..], &7i16.to_be_bytes());

        let mut out = bytes::BytesMut::new();
        assert!(DbValue::Int(i64::MAX).to_sql(&Type::INT4, &mut out).is_err());
    }

    #[test]
    fn null_bindings_carry_no_value() {
        let mut out = bytes::BytesMut::new();
        let value =
            bind_value_to_postgres(BindValue::Null(crate::types::SqlType::Integer)).unwrap();
        assert!(matches!(value.to_sql(&Type::INT4, &mut out).unwrap(), IsNull::Yes));
        assert!(bind_value_to_postgres(BindValue::Out(crate::types::SqlType::Integer)).is_err());
    }
}
