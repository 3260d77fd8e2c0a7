//! Namespaced property keys and tagged property values.
//!
//! Every record carries a bag of properties. Keys are split into namespaces so
//! that attributes loaded by a provider (the base namespace) can never collide
//! with attributes derived by a post-processor:
//!
//! ```text
//! phone_numbers                     base
//! statistics.phone_number_count     derived ("statistics" namespace)
//! ```
//!
//! Declared properties are exposed as [`TypedKey`] constants so that reads and
//! writes are checked against the expected Rust type instead of being cast at
//! the use site.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Origin of a property key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Attributes supplied by a provider.
    Base,
    /// Attributes written by the named post-processor family.
    Derived(&'static str),
}

/// A namespaced property key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey {
    namespace: Namespace,
    name: Cow<'static, str>,
}

impl PropertyKey {
    /// Creates a key in the base namespace.
    pub const fn base(name: &'static str) -> Self {
        Self {
            namespace: Namespace::Base,
            name: Cow::Borrowed(name),
        }
    }

    /// Creates a key in a derived namespace.
    pub const fn derived(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace: Namespace::Derived(namespace),
            name: Cow::Borrowed(name),
        }
    }

    /// Creates a base key from a runtime string (e.g. a field read from a file).
    pub fn base_owned(name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Base,
            name: Cow::Owned(name.into()),
        }
    }

    /// Returns the key's namespace.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Returns the key name without its namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for keys written by post-processors.
    pub fn is_derived(&self) -> bool {
        matches!(self.namespace, Namespace::Derived(_))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Namespace::Base => write!(f, "{}", self.name),
            Namespace::Derived(namespace) => write!(f, "{}.{}", namespace, self.name),
        }
    }
}

/// A property value.
///
/// Serialized untagged, so a JSON contact file maps naturally onto it:
/// numbers become `Integer`/`Number`, arrays become `List`, objects `Map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Flag(_) => "flag",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Number(_) => "number",
            PropertyValue::Text(_) => "text",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Flag(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Rust types that can be stored behind a [`TypedKey`].
pub trait PropertyType: Sized {
    /// Type name reported on mismatch.
    const KIND: &'static str;

    /// Converts into a stored value.
    fn into_value(self) -> PropertyValue;

    /// Reads from a stored value, or `None` if the stored type differs.
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl PropertyType for bool {
    const KIND: &'static str = "flag";

    fn into_value(self) -> PropertyValue {
        PropertyValue::Flag(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl PropertyType for i64 {
    const KIND: &'static str = "integer";

    fn into_value(self) -> PropertyValue {
        PropertyValue::Integer(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl PropertyType for f64 {
    const KIND: &'static str = "number";

    fn into_value(self) -> PropertyValue {
        PropertyValue::Number(self)
    }

    // Integers widen losslessly enough for statistics.
    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl PropertyType for String {
    const KIND: &'static str = "text";

    fn into_value(self) -> PropertyValue {
        PropertyValue::Text(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl PropertyType for Vec<String> {
    const KIND: &'static str = "list of text";

    fn into_value(self) -> PropertyValue {
        PropertyValue::List(self.into_iter().map(PropertyValue::Text).collect())
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::List(items) => items
                .iter()
                .map(|item| item.as_text().map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

/// A property key bound to the Rust type stored under it.
pub struct TypedKey<T> {
    key: PropertyKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    /// Declares a typed base property.
    pub const fn base(name: &'static str) -> Self {
        Self {
            key: PropertyKey::base(name),
            _marker: PhantomData,
        }
    }

    /// Declares a typed derived property.
    pub const fn derived(namespace: &'static str, name: &'static str) -> Self {
        Self {
            key: PropertyKey::derived(namespace, name),
            _marker: PhantomData,
        }
    }

    /// Returns the untyped key.
    pub const fn key(&self) -> &PropertyKey {
        &self.key
    }
}

impl<T> fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedKey").field(&self.key).finish()
    }
}

/// A stored property did not have the type its key declares.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Property '{key}' holds a {found} value, expected {expected}")]
pub struct PropertyTypeError {
    pub key: String,
    pub expected: &'static str,
    pub found: &'static str,
}
