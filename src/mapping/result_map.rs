use std::sync::Arc;

use crate::types::TypeKey;

/// Column → property rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMapping {
    pub property: String,
    pub column: String,
    /// Read through this adapter instead of passing the driver value through
    pub type_key: Option<TypeKey>,
    /// Part of the identity of the object (its group key)
    pub id: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    /// At most one nested object
    Association,
    /// A list of nested objects accumulated from repeated rows
    Collection,
}

#[derive(Debug, Clone)]
pub struct NestedResultMapping {
    pub property: String,
    pub kind: NestedKind,
    pub result_map: Arc<ResultMap>,
    /// Prepended to every column of the nested map
    pub column_prefix: Option<String>,
    /// The nested object exists only when one of these columns is non-null.
    /// Empty means "any mapped column is non-null".
    pub not_null_columns: Vec<String>,
}

/// How rows become records.
///
/// ```rust
/// use reactive_sql_mapper::prelude::*;
///
/// let post = ResultMap::new("post").id("id", "post_id").column("body", "post_body");
/// let blog = ResultMap::new("blog")
///     .id("id", "blog_id")
///     .column("title", "blog_title")
///     .collection("posts", post);
/// assert!(blog.has_nested());
/// ```
#[derive(Debug, Clone)]
pub struct ResultMap {
    pub id: String,
    pub mappings: Vec<ResultMapping>,
    pub nested: Vec<NestedResultMapping>,
    /// Map columns without an explicit rule to same-named properties.
    /// Only honored when the map has no nested mappings.
    pub auto_mapping: bool,
}

impl ResultMap {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mappings: Vec::new(),
            nested: Vec::new(),
            auto_mapping: false,
        }
    }

    /// A map that copies every column into a same-named property.
    #[must_use]
    pub fn auto(id: impl Into<String>) -> Self {
        Self::new(id).auto_mapping(true)
    }

    #[must_use]
    pub fn id(mut self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.mappings.push(ResultMapping {
            property: property.into(),
            column: column.into(),
            type_key: None,
            id: true,
        });
        self
    }

    #[must_use]
    pub fn column(mut self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.mappings.push(ResultMapping {
            property: property.into(),
            column: column.into(),
            type_key: None,
            id: false,
        });
        self
    }

    #[must_use]
    pub fn typed_column(
        mut self,
        property: impl Into<String>,
        column: impl Into<String>,
        type_key: TypeKey,
    ) -> Self {
        self.mappings.push(ResultMapping {
            property: property.into(),
            column: column.into(),
            type_key: Some(type_key),
            id: false,
        });
        self
    }

    #[must_use]
    pub fn auto_mapping(mut self, enabled: bool) -> Self {
        self.auto_mapping = enabled;
        self
    }

    #[must_use]
    pub fn association(self, property: impl Into<String>, result_map: ResultMap) -> Self {
        self.nested(property, NestedKind::Association, result_map, None, Vec::new())
    }

    #[must_use]
    pub fn collection(self, property: impl Into<String>, result_map: ResultMap) -> Self {
        self.nested(property, NestedKind::Collection, result_map, None, Vec::new())
    }

    #[must_use]
    pub fn nested(
        mut self,
        property: impl Into<String>,
        kind: NestedKind,
        result_map: ResultMap,
        column_prefix: Option<String>,
        not_null_columns: Vec<String>,
    ) -> Self {
        self.nested.push(NestedResultMapping {
            property: property.into(),
            kind,
            result_map: Arc::new(result_map),
            column_prefix,
            not_null_columns,
        });
        self
    }

    #[must_use]
    pub fn has_nested(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Mappings that identify an object; every mapping when none is marked as id.
    pub fn key_mappings(&self) -> impl Iterator<Item = &ResultMapping> {
        let has_ids = self.mappings.iter().any(|m| m.id);
        self.mappings.iter().filter(move |m| !has_ids || m.id)
    }
}
