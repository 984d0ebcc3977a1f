//! Entities: a key plus named property values.

use crate::key::Key;
use crate::value::Value;
use crate::wire::Properties;

/// A keyed record with named properties.
///
/// The key is fixed once the entity exists. Storage layers that allocate
/// ids produce a new entity through [`Entity::with_key`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    key: Key,
    properties: Properties,
}

impl Entity {
    /// Creates an entity with no properties.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: Properties::new(),
        }
    }

    /// Creates an entity with the given properties.
    pub fn with_properties(key: Key, properties: Properties) -> Self {
        Self { key, properties }
    }

    /// Returns the same properties under a different key.
    pub fn with_key(self, key: Key) -> Self {
        Self {
            key,
            properties: self.properties,
        }
    }

    /// Returns the key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Returns the kind of the terminal path element.
    pub fn kind(&self) -> &str {
        self.key.kind()
    }

    /// Returns a property value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Removes a property.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Returns all properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if there are no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Field-level merge: every incoming property overwrites the stored one,
    /// properties absent from `incoming` are kept.
    pub fn merge(&mut self, incoming: Properties) {
        self.properties.extend(incoming);
    }

    /// Splits the entity into key and properties.
    pub fn into_parts(self) -> (Key, Properties) {
        (self.key, self.properties)
    }
}
