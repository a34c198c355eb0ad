use futures_util::StreamExt;

use crate::driver::ResultStream;
use crate::error::SqlMapperError;
use crate::mapping::KeyGeneration;
use crate::record::{ParameterObject, Record};
use crate::results::DbRow;
use crate::types::SqlValue;

/// Consume the generated-key rows of an insert and write them back onto the parameter object.
///
/// Row `i` goes to a single record parameter when `i == 0`, or to element `i` of a batch.
/// Returns the number of key rows processed.
pub(crate) async fn apply_generated_keys(
    mut results: ResultStream,
    keys: &KeyGeneration,
    parameter: &mut ParameterObject,
) -> Result<u64, SqlMapperError> {
    let mut processed: usize = 0;
    while let Some(result) = results.next().await {
        let mut rows = result?.rows();
        while let Some(row) = rows.next().await {
            let row = row?;
            let target = key_target(parameter, processed)?;
            assign_keys(target, keys, &row)?;
            processed += 1;
        }
    }
    u64::try_from(processed)
        .map_err(|e| SqlMapperError::ExecutionError(format!("generated key count overflow: {e}")))
}

fn key_target(
    parameter: &mut ParameterObject,
    index: usize,
) -> Result<&mut Record, SqlMapperError> {
    match parameter {
        ParameterObject::Record(record) if index == 0 => Ok(record),
        ParameterObject::Record(_) => Err(SqlMapperError::MappingError(
            "statement returned more generated key rows than parameter objects".into(),
        )),
        ParameterObject::Batch(records) => {
            let available = records.len();
            records.get_mut(index).ok_or_else(|| {
                SqlMapperError::MappingError(format!(
                    "generated key row {} has no matching parameter object ({available} given)",
                    index + 1
                ))
            })
        }
        ParameterObject::None | ParameterObject::Scalar(_) => Err(SqlMapperError::MappingError(
            "generated keys need a record or batch parameter object".into(),
        )),
    }
}

fn assign_keys(
    target: &mut Record,
    keys: &KeyGeneration,
    row: &DbRow,
) -> Result<(), SqlMapperError> {
    for (position, (property, column)) in keys
        .key_properties
        .iter()
        .zip(&keys.key_columns)
        .enumerate()
    {
        // drivers may rename returned columns; fall back to position
        let value = row
            .get(column)
            .or_else(|| row.get_by_index(position))
            .cloned()
            .ok_or_else(|| {
                SqlMapperError::MappingError(format!("generated key column '{column}' is missing"))
            })?;
        target.set_value(property, SqlValue::from(value))?;
    }
    Ok(())
}
