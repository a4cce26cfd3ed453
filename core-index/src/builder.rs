//! Field-mapping document builder.
//!
//! Turns a [`SourceRecord`] into a [`Document`] by copying fields into text
//! properties. Fields declared as contact points are gathered into the
//! nested `contactPoints` property (one entry per value, labelled with the
//! source field), and fields declared as alternate names into
//! `additionalNames`. Every other field is copied under its own name.

use bridge_traits::{
    error::{BridgeError, Result},
    Document, DocumentBuilder, Properties, PropertyValue, SourceRecord,
    ADDITIONAL_NAMES_PROPERTY, CONTACT_POINTS_PROPERTY,
};
use std::collections::BTreeSet;

/// Label of a contact point entry.
pub const CONTACT_LABEL_PROPERTY: &str = "label";
/// Value of a contact point entry.
pub const CONTACT_VALUE_PROPERTY: &str = "value";

#[derive(Debug, Clone)]
pub struct FieldDocumentBuilder {
    namespace: String,
    schema: String,
    contact_point_fields: BTreeSet<String>,
    additional_name_fields: BTreeSet<String>,
    ignored_fields: BTreeSet<String>,
}

impl FieldDocumentBuilder {
    pub fn new(namespace: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            schema: schema.into(),
            contact_point_fields: BTreeSet::new(),
            additional_name_fields: BTreeSet::new(),
            ignored_fields: BTreeSet::new(),
        }
    }

    /// Treat `field` as a contact point (email, phone, address...).
    pub fn contact_point_field(mut self, field: impl Into<String>) -> Self {
        self.contact_point_fields.insert(field.into());
        self
    }

    /// Treat `field` as an alternate name (nickname, phonetic name...).
    pub fn additional_name_field(mut self, field: impl Into<String>) -> Self {
        self.additional_name_fields.insert(field.into());
        self
    }

    /// Leave `field` out of the document entirely.
    pub fn ignore_field(mut self, field: impl Into<String>) -> Self {
        self.ignored_fields.insert(field.into());
        self
    }
}

impl DocumentBuilder for FieldDocumentBuilder {
    fn build(&self, record: &SourceRecord) -> Result<Document> {
        if record.id.is_empty() {
            return Err(BridgeError::OperationFailed(
                "Source record has an empty id".to_string(),
            ));
        }

        let mut document = Document::new(&self.namespace, &self.schema, &record.id)
            .with_creation_timestamp(record.last_updated_ms);

        // Fields iterate in name order, so the output never depends on how
        // the record was assembled.
        for (field, values) in &record.fields {
            if self.ignored_fields.contains(field) || values.is_empty() {
                continue;
            }

            if self.contact_point_fields.contains(field) {
                for value in values {
                    let mut entry = Properties::new();
                    entry.insert(
                        CONTACT_LABEL_PROPERTY.to_string(),
                        vec![PropertyValue::from(field.as_str())],
                    );
                    entry.insert(
                        CONTACT_VALUE_PROPERTY.to_string(),
                        vec![PropertyValue::from(value.as_str())],
                    );
                    document.push_value(CONTACT_POINTS_PROPERTY, PropertyValue::Nested(entry));
                }
            } else if self.additional_name_fields.contains(field) {
                for value in values {
                    document.push_value(ADDITIONAL_NAMES_PROPERTY, value.as_str());
                }
            } else {
                document = document.with_property(field.as_str(), values.iter().map(String::as_str));
            }
        }

        Ok(document)
    }
}
