//! Property containers used as parameter objects and as mapped results.
//!
//! A [`Record`] is an ordered map of named properties. Property paths are dotted
//! (`author.name`); the parameter binder reads through them and generated keys are written
//! back through them.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SqlMapperError;
use crate::types::SqlValue;

/// A single named slot inside a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Property {
    Value(SqlValue),
    Object(Record),
    List(Vec<Record>),
}

impl Property {
    #[must_use]
    pub fn as_value(&self) -> Option<&SqlValue> {
        if let Property::Value(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Record> {
        if let Property::Object(record) = self {
            Some(record)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Record]> {
        if let Property::List(list) = self {
            Some(list)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Property>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a plain value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.fields
            .insert(name.into(), Property::Value(value.into()));
        self
    }

    /// Builder-style insert of a nested object.
    #[must_use]
    pub fn with_object(mut self, name: impl Into<String>, record: Record) -> Self {
        self.fields.insert(name.into(), Property::Object(record));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, property: Property) {
        self.fields.insert(name.into(), property);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Resolve a dotted property path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Property> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.fields.get(part)?;
        }
        Some(current)
    }

    #[must_use]
    pub fn value(&self, path: &str) -> Option<&SqlValue> {
        self.get(path).and_then(Property::as_value)
    }

    #[must_use]
    pub fn list(&self, path: &str) -> Option<&[Record]> {
        self.get(path).and_then(Property::as_list)
    }

    #[must_use]
    pub fn object(&self, path: &str) -> Option<&Record> {
        self.get(path).and_then(Property::as_object)
    }

    /// Write a value at a dotted path, creating intermediate objects as needed.
    ///
    /// # Errors
    /// Returns `SqlMapperError::MappingError` if an intermediate segment holds a value or list.
    pub fn set_value(&mut self, path: &str, value: SqlValue) -> Result<(), SqlMapperError> {
        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };
        let mut target = self;
        if let Some(parents) = parents {
            for part in parents.split('.') {
                let slot = target
                    .fields
                    .entry(part.to_string())
                    .or_insert_with(|| Property::Object(Record::new()));
                target = match slot {
                    Property::Object(record) => record,
                    _ => {
                        return Err(SqlMapperError::MappingError(format!(
                            "cannot set '{path}': '{part}' is not an object"
                        )));
                    }
                };
            }
        }
        target
            .fields
            .insert(leaf.to_string(), Property::Value(value));
        Ok(())
    }

    /// Convert into any deserializable type through its JSON form.
    ///
    /// # Errors
    /// Returns `SqlMapperError::JsonError` if the record does not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, SqlMapperError> {
        let json = serde_json::to_value(self)?;
        Ok(serde_json::from_value(json)?)
    }
}

/// The caller-supplied parameter of a mapped statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParameterObject {
    #[default]
    None,
    /// A single value bound to every placeholder.
    Scalar(SqlValue),
    /// Properties looked up by path.
    Record(Record),
    /// One record per generated-key row (multi-row inserts).
    Batch(Vec<Record>),
}

impl ParameterObject {
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        if let ParameterObject::Record(record) = self {
            Some(record)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_batch(&self) -> Option<&[Record]> {
        if let ParameterObject::Batch(records) = self {
            Some(records)
        } else {
            None
        }
    }

    /// Property lookup on a composite parameter. Batch parameters resolve `N.path` by index.
    #[must_use]
    pub fn property(&self, path: &str) -> Option<&SqlValue> {
        match self {
            ParameterObject::Record(record) => record.value(path),
            ParameterObject::Batch(records) => {
                let (index, rest) = path.split_once('.')?;
                records.get(index.parse::<usize>().ok()?)?.value(rest)
            }
            ParameterObject::None | ParameterObject::Scalar(_) => None,
        }
    }
}

impl From<Record> for ParameterObject {
    fn from(record: Record) -> Self {
        ParameterObject::Record(record)
    }
}

impl From<Vec<Record>> for ParameterObject {
    fn from(records: Vec<Record>) -> Self {
        ParameterObject::Batch(records)
    }
}

impl From<SqlValue> for ParameterObject {
    fn from(value: SqlValue) -> Self {
        ParameterObject::Scalar(value)
    }
}

impl From<i64> for ParameterObject {
    fn from(value: i64) -> Self {
        ParameterObject::Scalar(SqlValue::Int(value))
    }
}

impl From<i32> for ParameterObject {
    fn from(value: i32) -> Self {
        ParameterObject::Scalar(SqlValue::from(value))
    }
}

impl From<&str> for ParameterObject {
    fn from(value: &str) -> Self {
        ParameterObject::Scalar(SqlValue::from(value))
    }
}

impl From<()> for ParameterObject {
    fn from((): ()) -> Self {
        ParameterObject::None
    }
}
