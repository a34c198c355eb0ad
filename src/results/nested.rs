use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::row::DbRow;
use crate::error::SqlMapperError;
use crate::mapping::{NestedKind, NestedResultMapping, ResultMap};
use crate::record::{Property, Record};
use crate::type_handler::TypeAdapterRegistry;
use crate::types::{DbValue, SqlValue};

/// Hashable image of one column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl From<Option<&DbValue>> for KeyPart {
    fn from(value: Option<&DbValue>) -> Self {
        match value {
            None | Some(DbValue::Null) => KeyPart::Null,
            Some(DbValue::Bool(b)) => KeyPart::Bool(*b),
            Some(DbValue::Int(i)) => KeyPart::Int(*i),
            Some(DbValue::Float(f)) => KeyPart::Float(f.to_bits()),
            Some(DbValue::Text(s)) => KeyPart::Text(s.clone()),
            Some(DbValue::Blob(b)) => KeyPart::Blob(b.clone()),
            Some(DbValue::Timestamp(ts)) => KeyPart::Timestamp(*ts),
        }
    }
}

/// Column values that identify which object a row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<KeyPart>);

impl GroupKey {
    /// Key of `map` in `row`: its id columns, every mapped column when no id is declared, or the
    /// whole row for a map without explicit mappings.
    pub(crate) fn from_row(map: &ResultMap, row: &DbRow, prefix: Option<&str>) -> Self {
        if map.mappings.is_empty() {
            return GroupKey(
                row.values
                    .iter()
                    .map(|value| KeyPart::from(Some(value)))
                    .collect(),
            );
        }
        GroupKey(
            map.key_mappings()
                .map(|m| KeyPart::from(row.get(&prefixed(prefix, &m.column))))
                .collect(),
        )
    }
}

fn prefixed(prefix: Option<&str>, column: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{column}"),
        None => column.to_string(),
    }
}

fn join_prefix(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
    match (outer, inner) {
        (None, None) => None,
        (Some(p), None) | (None, Some(p)) => Some(p.to_string()),
        (Some(outer), Some(inner)) => Some(format!("{outer}{inner}")),
    }
}

/// `user_name` → `userName`; names without underscores are left alone.
pub(crate) fn underscore_to_camel_case(column: &str) -> String {
    if !column.contains('_') {
        return column.to_string();
    }
    let mut out = String::with_capacity(column.len());
    let mut upper_next = false;
    for ch in column.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Turns rows into records following a result map.
#[derive(Debug, Clone)]
pub struct RowMapper {
    type_adapters: Arc<TypeAdapterRegistry>,
    camel_case: bool,
}

impl RowMapper {
    #[must_use]
    pub fn new(
        type_adapters: Arc<TypeAdapterRegistry>,
        map_underscore_to_camel_case: bool,
    ) -> Self {
        Self {
            type_adapters,
            camel_case: map_underscore_to_camel_case,
        }
    }

    /// Map a single row. Without a result map every column becomes a property.
    ///
    /// # Errors
    /// Propagates type adapter read failures.
    pub fn map_row(&self, map: Option<&ResultMap>, row: &DbRow) -> Result<Record, SqlMapperError> {
        match map {
            Some(map) => self.simple_properties(map, row, None),
            None => self.auto_map(row, None, &HashSet::new(), Record::new()),
        }
    }

    /// Explicit mappings plus auto-mapping of the remaining columns when the map allows it.
    fn simple_properties(
        &self,
        map: &ResultMap,
        row: &DbRow,
        prefix: Option<&str>,
    ) -> Result<Record, SqlMapperError> {
        let mut record = Record::new();
        let mut mapped = HashSet::new();
        for mapping in &map.mappings {
            let column = prefixed(prefix, &mapping.column);
            let raw = row.get(&column).cloned().unwrap_or(DbValue::Null);
            let value = self.type_adapters.read(mapping.type_key.as_ref(), raw)?;
            record.set_value(&mapping.property, value)?;
            mapped.insert(column.to_ascii_lowercase());
        }
        if map.auto_mapping && !map.has_nested() {
            record = self.auto_map(row, prefix, &mapped, record)?;
        }
        Ok(record)
    }

    fn auto_map(
        &self,
        row: &DbRow,
        prefix: Option<&str>,
        mapped: &HashSet<String>,
        mut record: Record,
    ) -> Result<Record, SqlMapperError> {
        for (name, value) in row.columns.names().iter().zip(&row.values) {
            if mapped.contains(&name.to_ascii_lowercase()) {
                continue;
            }
            let column = match prefix {
                Some(prefix) => match name.strip_prefix(prefix) {
                    Some(rest) => rest,
                    None => continue,
                },
                None => name.as_str(),
            };
            let property = if self.camel_case {
                underscore_to_camel_case(column)
            } else {
                column.to_string()
            };
            let value = self.type_adapters.read(None, value.clone())?;
            record.insert(property, Property::Value(value));
        }
        Ok(record)
    }

    /// Whether the row carries a nested object at all.
    fn nested_present(
        &self,
        nested: &NestedResultMapping,
        row: &DbRow,
        prefix: Option<&str>,
    ) -> bool {
        let non_null = |column: &str| {
            row.get(&prefixed(prefix, column))
                .is_some_and(|value| !value.is_null())
        };
        if !nested.not_null_columns.is_empty() {
            return nested.not_null_columns.iter().any(|c| non_null(c));
        }
        if nested.result_map.mappings.is_empty() {
            return match prefix {
                Some(prefix) => row
                    .columns
                    .names()
                    .iter()
                    .zip(&row.values)
                    .any(|(name, value)| name.starts_with(prefix) && !value.is_null()),
                None => row.values.iter().any(|value| !value.is_null()),
            };
        }
        nested
            .result_map
            .mappings
            .iter()
            .any(|m| non_null(&m.column))
    }
}

enum NestedSlot {
    Association(Option<(GroupKey, Box<ObjectBuilder>)>),
    Collection {
        items: Vec<ObjectBuilder>,
        index: HashMap<GroupKey, usize>,
    },
}

/// One object under construction, accumulating nested objects across rows.
pub(crate) struct ObjectBuilder {
    record: Record,
    slots: Vec<NestedSlot>,
}

impl ObjectBuilder {
    /// Start an object from the first row of its group.
    pub(crate) fn start(
        mapper: &RowMapper,
        map: &ResultMap,
        row: &DbRow,
        prefix: Option<&str>,
    ) -> Result<Self, SqlMapperError> {
        let slots = map
            .nested
            .iter()
            .map(|nested| match nested.kind {
                NestedKind::Association => NestedSlot::Association(None),
                NestedKind::Collection => NestedSlot::Collection {
                    items: Vec::new(),
                    index: HashMap::new(),
                },
            })
            .collect();
        let mut builder = Self {
            record: mapper.simple_properties(map, row, prefix)?,
            slots,
        };
        builder.apply(mapper, map, row, prefix)?;
        Ok(builder)
    }

    /// Fold a further row of the same group into the nested objects.
    pub(crate) fn apply(
        &mut self,
        mapper: &RowMapper,
        map: &ResultMap,
        row: &DbRow,
        prefix: Option<&str>,
    ) -> Result<(), SqlMapperError> {
        for (slot, nested) in self.slots.iter_mut().zip(&map.nested) {
            let child_prefix = join_prefix(prefix, nested.column_prefix.as_deref());
            let child_prefix = child_prefix.as_deref();
            if !mapper.nested_present(nested, row, child_prefix) {
                continue;
            }
            let child_map = nested.result_map.as_ref();
            let key = GroupKey::from_row(child_map, row, child_prefix);
            match slot {
                NestedSlot::Association(association) => match association {
                    // first association wins; later rows only extend it
                    Some((existing, builder)) => {
                        if *existing == key {
                            builder.apply(mapper, child_map, row, child_prefix)?;
                        }
                    }
                    None => {
                        let builder = ObjectBuilder::start(mapper, child_map, row, child_prefix)?;
                        *association = Some((key, Box::new(builder)));
                    }
                },
                NestedSlot::Collection { items, index } => match index.get(&key) {
                    Some(&at) => items[at].apply(mapper, child_map, row, child_prefix)?,
                    None => {
                        index.insert(key, items.len());
                        items.push(ObjectBuilder::start(mapper, child_map, row, child_prefix)?);
                    }
                },
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self, map: &ResultMap) -> Record {
        let mut record = self.record;
        for (slot, nested) in self.slots.into_iter().zip(&map.nested) {
            let property = match slot {
                NestedSlot::Association(Some((_, builder))) => {
                    Property::Object(builder.finish(&nested.result_map))
                }
                NestedSlot::Association(None) => Property::Value(SqlValue::Null),
                NestedSlot::Collection { items, .. } => Property::List(
                    items
                        .into_iter()
                        .map(|item| item.finish(&nested.result_map))
                        .collect(),
                ),
            };
            record.insert(nested.property.clone(), property);
        }
        record
    }
}
