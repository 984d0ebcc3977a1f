//! Entity store trait definition.

use crate::error::StorageResult;
use synkit_codec::{Entity, Key};

/// A keyed entity store.
///
/// Stores map complete keys to entities. Each call is individually atomic;
/// there are no multi-call transactions.
///
/// # Invariants
///
/// - `put` of an entity whose terminal element is incomplete allocates a
///   fresh numeric id, never reused within the store
/// - `put` of a complete key overwrites the stored entity
/// - `delete` of a missing key succeeds and returns `false`
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait EntityStore: Send + Sync {
    /// Reads the entity stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &Key) -> StorageResult<Option<Entity>>;

    /// Writes an entity, returning its complete key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, entity: Entity) -> StorageResult<Key>;

    /// Removes the entity stored under `key`.
    ///
    /// Returns whether an entity was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn delete(&self, key: &Key) -> StorageResult<bool>;

    /// Lists every entity of `kind` in `namespace`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn scan_kind(&self, namespace: Option<&str>, kind: &str) -> StorageResult<Vec<Entity>>;

    /// Returns the number of stored entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn len(&self) -> StorageResult<usize>;

    /// Returns true if the store holds no entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
