//! Declared model schema: attributes and indices in declaration order.
//!
//! ```
//! use codefirst::schema::{ColumnSchema, IndexDefinition, ModelSchema};
//!
//! let comments = ModelSchema::new("comments")
//!     .attribute("body", ColumnSchema::new("text").required())
//!     .attribute("user_id", ColumnSchema::new("integer"))
//!     .attribute("post_id", ColumnSchema::new("integer"))
//!     .index("user_post", IndexDefinition::new(["user_id", "post_id"]).unique());
//! assert_eq!(comments.attributes.len(), 3);
//! ```
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// Primary key column every table gets for free.
pub const PRIMARY_KEY: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Insertion-ordered string-keyed map.
///
/// Inserting an existing key replaces the value and keeps its position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

/// Attribute name -> column schema.
pub type AttributeSchema = OrderedMap<ColumnSchema>;
/// Index name -> index definition.
pub type IndexSchema = OrderedMap<IndexDefinition>;

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder form of [`OrderedMap::insert`].
    pub fn with(mut self, key: impl Into<String>, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut access: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Per-attribute declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl ColumnSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        ColumnSchema {
            type_name: type_name.into(),
            index: false,
            unique: false,
            default: None,
            required: false,
            limit: None,
            precision: None,
            scale: None,
        }
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Physical column options, shared by the text renderer and the live executor.
    pub fn column_options(&self) -> ColumnOptions {
        ColumnOptions {
            null: if self.required { Some(false) } else { None },
            default: self.default.clone(),
            limit: self.limit,
            precision: self.precision,
            scale: self.scale,
        }
    }
}

/// Column modifiers, in the order they are rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnOptions {
    pub null: Option<bool>,
    pub default: Option<Value>,
    pub limit: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl ColumnOptions {
    pub fn not_null() -> Self {
        ColumnOptions {
            null: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ColumnOptions::default()
    }
}

/// An explicit (possibly composite) index declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IndexDefinition {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexDefinition {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            name: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// True when this index covers exactly the single column `column`.
    pub fn covers_only(&self, column: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == column
    }

    pub fn options(&self) -> IndexOptions {
        IndexOptions {
            unique: self.unique,
            name: self.name.clone(),
        }
    }
}

/// Options passed along with an `add_index` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    pub unique: bool,
    pub name: Option<String>,
}

impl IndexOptions {
    pub fn unique() -> Self {
        IndexOptions {
            unique: true,
            name: None,
        }
    }
}

/// A declared model: its table name plus attribute and index schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub table_name: String,
    #[serde(default)]
    pub attributes: AttributeSchema,
    #[serde(default)]
    pub indices: IndexSchema,
}

impl ModelSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        ModelSchema {
            table_name: table_name.into(),
            attributes: AttributeSchema::new(),
            indices: IndexSchema::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, column: ColumnSchema) -> Self {
        self.attributes.insert(name, column);
        self
    }

    pub fn index(mut self, name: impl Into<String>, index: IndexDefinition) -> Self {
        self.indices.insert(name, index);
        self
    }

    /// Parse a JSON schema document, keeping attribute order as written.
    pub fn from_json(source: &str) -> Result<Self> {
        let schema: ModelSchema = serde_json::from_str(source)?;
        validate(&schema.table_name, &schema.attributes, &schema.indices)?;
        Ok(schema)
    }
}

/// True unless both timestamp columns are declared explicitly.
pub fn needs_timestamps(attributes: &AttributeSchema) -> bool {
    !(attributes.contains_key(CREATED_AT) && attributes.contains_key(UPDATED_AT))
}

/// Attribute-level `index: true` entries not already covered by an
/// explicit single-column index.
pub fn implicit_indices<'a>(
    attributes: &'a AttributeSchema,
    indices: &'a IndexSchema,
) -> impl Iterator<Item = (&'a str, &'a ColumnSchema)> {
    attributes.iter().filter(move |(name, column)| {
        column.index && !indices.values().any(|idx| idx.covers_only(name))
    })
}

/// ASCII letters, digits and `_`, not starting with a digit.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject schemas the renderer and executor cannot faithfully express.
pub fn validate(
    table_name: &str,
    attributes: &AttributeSchema,
    indices: &IndexSchema,
) -> Result<()> {
    if !is_identifier(table_name) {
        return Err(Error::schema(
            table_name,
            "table name must be a non-empty identifier",
        ));
    }
    for (name, column) in attributes.iter() {
        if !is_identifier(name) {
            return Err(Error::schema(
                table_name,
                format!("attribute name `{}` is not an identifier", name),
            ));
        }
        if column.type_name.trim().is_empty() {
            return Err(Error::schema(
                table_name,
                format!("attribute `{}` has no type", name),
            ));
        }
        if !is_identifier(&column.type_name) {
            return Err(Error::schema(
                table_name,
                format!("attribute `{}` has invalid type `{}`", name, column.type_name),
            ));
        }
    }
    for (name, index) in indices.iter() {
        if index.columns.is_empty() {
            return Err(Error::schema(
                table_name,
                format!("index `{}` has no columns", name),
            ));
        }
        if let Some(column) = index.columns.iter().find(|c| !is_identifier(c)) {
            return Err(Error::schema(
                table_name,
                format!("index `{}` lists invalid column `{}`", name, column),
            ));
        }
        if let Some(explicit) = index.name.as_deref().filter(|n| !is_identifier(n)) {
            return Err(Error::schema(
                table_name,
                format!("index `{}` has invalid name `{}`", name, explicit),
            ));
        }
    }
    Ok(())
}
