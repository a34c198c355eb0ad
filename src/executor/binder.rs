use crate::config::Settings;
use crate::driver::{BindValue, DriverStatement};
use crate::error::SqlMapperError;
use crate::mapping::{BoundSql, ParameterMapping};
use crate::record::ParameterObject;
use crate::type_handler::TypeAdapterRegistry;
use crate::types::{DbValue, ParameterMode, SqlValue};

/// Binds the parameters of one execution, in declaration order.
pub(crate) struct ParameterBinder<'a> {
    type_adapters: &'a TypeAdapterRegistry,
    settings: &'a Settings,
}

impl<'a> ParameterBinder<'a> {
    pub(crate) fn new(type_adapters: &'a TypeAdapterRegistry, settings: &'a Settings) -> Self {
        Self {
            type_adapters,
            settings,
        }
    }

    /// Bind every mapping of `bound_sql` on `statement` and return what was bound.
    ///
    /// Failures are reported as `TypeBindingError` naming the parameter mapping.
    pub(crate) fn bind_all(
        &self,
        statement: &mut dyn DriverStatement,
        bound_sql: &BoundSql,
        parameter: &ParameterObject,
    ) -> Result<Vec<BindValue>, SqlMapperError> {
        let mut bound = Vec::with_capacity(bound_sql.parameter_mappings().len());
        for (index, mapping) in bound_sql.parameter_mappings().iter().enumerate() {
            let value = self
                .bind_value(bound_sql, parameter, mapping)
                .map_err(|err| SqlMapperError::binding(mapping.to_string(), err))?;
            statement
                .bind(index, value.clone())
                .map_err(|err| SqlMapperError::binding(mapping.to_string(), err))?;
            bound.push(value);
        }
        Ok(bound)
    }

    fn bind_value(
        &self,
        bound_sql: &BoundSql,
        parameter: &ParameterObject,
        mapping: &ParameterMapping,
    ) -> Result<BindValue, SqlMapperError> {
        let declared = mapping.sql_type.unwrap_or(self.settings.jdbc_type_for_null);
        if mapping.mode == ParameterMode::Out {
            return Ok(BindValue::Out(declared));
        }
        let value = resolve_value(bound_sql, parameter, &mapping.property)?;
        let raw = if value.is_null() {
            None
        } else {
            Some(self.convert(value, mapping)?)
        };
        Ok(match (mapping.mode, raw) {
            (ParameterMode::InOut, raw) => BindValue::InOut(raw.unwrap_or(DbValue::Null), declared),
            (_, Some(raw)) => BindValue::Value(raw),
            (_, None) => BindValue::Null(declared),
        })
    }

    /// Through the adapter of the mapping's type key (or the value's own), else raw.
    fn convert(
        &self,
        value: &SqlValue,
        mapping: &ParameterMapping,
    ) -> Result<DbValue, SqlMapperError> {
        let key = mapping.type_key.clone().or_else(|| value.type_key());
        if let Some(adapter) = key.as_ref().and_then(|key| self.type_adapters.adapter_for(key)) {
            return adapter.bind_parameter(value, mapping.sql_type);
        }
        value.to_raw().ok_or_else(|| {
            SqlMapperError::ParameterError(format!(
                "no type adapter registered for {key:?} and the driver cannot bind it directly"
            ))
        })
    }
}

/// Additional parameters win over a scalar parameter, which wins over a property lookup.
fn resolve_value<'p>(
    bound_sql: &'p BoundSql,
    parameter: &'p ParameterObject,
    property: &str,
) -> Result<&'p SqlValue, SqlMapperError> {
    const NULL: &SqlValue = &SqlValue::Null;
    if let Some(value) = bound_sql.additional_parameter(property) {
        return Ok(value);
    }
    match parameter {
        ParameterObject::None => Ok(NULL),
        ParameterObject::Scalar(value) => Ok(value),
        ParameterObject::Record(_) | ParameterObject::Batch(_) => {
            parameter.property(property).ok_or_else(|| {
                SqlMapperError::ParameterError(format!(
                    "parameter object has no property '{property}'"
                ))
            })
        }
    }
}
