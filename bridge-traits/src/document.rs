//! Canonical Document Model
//!
//! The unit handed to the index store. Properties live in a `BTreeMap`, so
//! iteration is always in lexicographic property-name order no matter how the
//! document was assembled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property name → ordered list of values.
pub type Properties = BTreeMap<String, Vec<PropertyValue>>;

/// Projection field selecting the stored fingerprint.
pub const FINGERPRINT_FIELD: &str = "fingerprint";

/// Projection field selecting the stored creation timestamp.
pub const CREATION_TIMESTAMP_FIELD: &str = "creationTimestamp";

/// Property holding one value per contact point (email, phone, address...).
pub const CONTACT_POINTS_PROPERTY: &str = "contactPoints";

/// Property holding nicknames, phonetic names and other alternate names.
pub const ADDITIONAL_NAMES_PROPERTY: &str = "additionalNames";

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    /// Nested property group, e.g. one contact point with its label
    Nested(Properties),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

/// Canonical representation of one source record inside the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable id, unique within the namespace
    pub id: String,
    /// Index namespace the document belongs to
    pub namespace: String,
    /// Schema type name
    pub schema: String,
    /// Content properties, ordered by name
    pub properties: Properties,
    /// Logical creation time in milliseconds (not the time of indexing)
    pub creation_timestamp_ms: i64,
    /// Content fingerprint; empty until computed
    pub fingerprint: Vec<u8>,
    /// Ranking signal derived from property cardinality
    pub score: i32,
}

impl Document {
    pub fn new(
        namespace: impl Into<String>,
        schema: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            schema: schema.into(),
            properties: Properties::new(),
            creation_timestamp_ms: 0,
            fingerprint: Vec::new(),
            score: 0,
        }
    }

    /// Replace all values of a property.
    pub fn with_property<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        self.properties
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Append one value to a property, creating it if needed.
    pub fn push_value(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn with_creation_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.creation_timestamp_ms = timestamp_ms;
        self
    }

    /// Number of values stored under `name` (0 if absent).
    pub fn value_count(&self, name: &str) -> usize {
        self.properties.get(name).map_or(0, Vec::len)
    }

    /// Copy of this document holding only the requested fields.
    ///
    /// `id`, `namespace` and `schema` are always kept. [`FINGERPRINT_FIELD`]
    /// and [`CREATION_TIMESTAMP_FIELD`] select the metadata fields; any other
    /// name selects a property.
    pub fn projected(&self, fields: &[&str]) -> Document {
        let mut projected = Document::new(&self.namespace, &self.schema, &self.id);

        for field in fields {
            match *field {
                FINGERPRINT_FIELD => projected.fingerprint = self.fingerprint.clone(),
                CREATION_TIMESTAMP_FIELD => {
                    projected.creation_timestamp_ms = self.creation_timestamp_ms
                }
                name => {
                    if let Some(values) = self.properties.get(name) {
                        projected.properties.insert(name.to_string(), values.clone());
                    }
                }
            }
        }

        projected
    }
}
