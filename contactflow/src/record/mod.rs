//! Record model shared by providers, post-processors, and the data source.
//!
//! A [`Record`] is one contact: a stable [`RecordId`] plus a [`PropertyBag`].
//! Providers create records with base properties; post-processors add or
//! overwrite derived properties. Properties are never removed and a record's
//! identity never changes once created.
//!
//! # JSON Shape
//!
//! ```json
//! {"id": "1", "given_name": "Ada", "phone_numbers": ["555-0100", "555-0101"]}
//! ```
//!
//! Every field other than `id` becomes a base property. The id may be a
//! string or an integer; fields set to `null` are skipped.
//!
//! Serializing a record produces a different, output-only shape with base and
//! derived properties kept apart:
//!
//! ```json
//! {"id": "1", "properties": {"given_name": "Ada"}, "derived": {"statistics": {"phone_number_count": 2}}}
//! ```

mod contact;
mod property;

pub use contact::{
    ContactBuilder, DISPLAY_NAME, EMAIL_ADDRESSES, FAMILY_NAME, GIVEN_NAME, ORGANIZATION,
    PHONE_NUMBERS,
};
pub use property::{
    Namespace, PropertyKey, PropertyType, PropertyTypeError, PropertyValue, TypedKey,
};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque record identifier, unique within one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

/// Ids as they appear in contact files.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecordId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawRecordId::deserialize(deserializer)? {
            RawRecordId::Text(id) => Self(id),
            RawRecordId::Signed(id) => Self(id.to_string()),
            RawRecordId::Unsigned(id) => Self(id.to_string()),
        })
    }
}

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Ordered property map. Values can be added or overwritten, never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: BTreeMap<PropertyKey, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or overwrites a value, returning the previous one.
    pub fn insert(&mut self, key: PropertyKey, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.insert(key, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single entity flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordDocument", into = "RecordView")]
pub struct Record {
    id: RecordId,
    properties: PropertyBag,
}

impl Record {
    /// Creates a record with no properties.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            properties: PropertyBag::new(),
        }
    }

    /// Starts building a contact record.
    pub fn contact(id: impl Into<RecordId>) -> ContactBuilder {
        ContactBuilder::new(id)
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Reads a declared property, failing if the stored type differs.
    pub fn get_typed<T: PropertyType>(
        &self,
        key: &TypedKey<T>,
    ) -> Result<Option<T>, PropertyTypeError> {
        match self.properties.get(key.key()) {
            None => Ok(None),
            Some(value) => T::from_value(value).map(Some).ok_or_else(|| PropertyTypeError {
                key: key.key().to_string(),
                expected: T::KIND,
                found: value.kind(),
            }),
        }
    }

    /// Inserts or overwrites a property.
    pub fn set(&mut self, key: PropertyKey, value: impl Into<PropertyValue>) {
        self.properties.insert(key, value.into());
    }

    /// Inserts or overwrites a declared property.
    pub fn set_typed<T: PropertyType>(&mut self, key: &TypedKey<T>, value: T) {
        self.properties.insert(key.key().clone(), value.into_value());
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, key: PropertyKey, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }
}

/// Input form of a record: `id` plus flattened base properties.
#[derive(Deserialize)]
struct RecordDocument {
    id: RecordId,
    #[serde(flatten)]
    properties: BTreeMap<String, Option<PropertyValue>>,
}

impl From<RecordDocument> for Record {
    fn from(document: RecordDocument) -> Self {
        let mut record = Record::new(document.id);
        for (name, value) in document.properties {
            if let Some(value) = value {
                record.set(PropertyKey::base_owned(name), value);
            }
        }
        record
    }
}

/// Output form of a record: base and derived properties in separate maps.
#[derive(Serialize)]
struct RecordView {
    id: RecordId,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, PropertyValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    derived: BTreeMap<&'static str, BTreeMap<String, PropertyValue>>,
}

impl From<Record> for RecordView {
    fn from(record: Record) -> Self {
        let mut properties = BTreeMap::new();
        let mut derived: BTreeMap<&'static str, BTreeMap<String, PropertyValue>> =
            BTreeMap::new();
        for (key, value) in record.properties.entries {
            match key.namespace() {
                Namespace::Base => {
                    properties.insert(key.name().to_string(), value);
                }
                Namespace::Derived(namespace) => {
                    derived
                        .entry(namespace)
                        .or_default()
                        .insert(key.name().to_string(), value);
                }
            }
        }
        Self {
            id: record.id,
            properties,
            derived,
        }
    }
}
