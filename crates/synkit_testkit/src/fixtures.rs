//! Test fixtures and engine helpers.
//!
//! Provides engines over throwaway stores and builders for the payloads a
//! client would send.

use crate::generators::TEST_APP_ID;
use serde_json::{json, Value as Json};
use std::path::PathBuf;
use std::sync::Arc;
use synkit_codec::{encode_value, Entity, Key, PathElement, Principal, Value, WireProperty};
use synkit_storage::{EntityStore, FileStore, InMemoryStore};
use synkit_sync_engine::{EngineConfig, SyncEngine, SyncResult};
use synkit_sync_protocol::{ContentHash, EntityPayload, SyncDeletedResult, SyncEntityResult};
use tempfile::TempDir;

/// A sync engine over a throwaway store.
pub struct TestEngine<S: EntityStore> {
    /// The engine.
    pub engine: SyncEngine<S>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestEngine<InMemoryStore> {
    /// Creates an engine over an in-memory store for [`TEST_APP_ID`].
    pub fn memory() -> Self {
        Self {
            engine: SyncEngine::new(EngineConfig::new(TEST_APP_ID), InMemoryStore::new()),
            _temp_dir: None,
        }
    }
}

impl TestEngine<FileStore> {
    /// Creates an engine over a file store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(&temp_dir.path().join("store.json"))
            .expect("Failed to open file store");
        Self {
            engine: SyncEngine::new(EngineConfig::new(TEST_APP_ID), store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Path of the store file.
    pub fn path(&self) -> PathBuf {
        self.engine.store().path().to_path_buf()
    }

    /// Opens a second engine on the same file, as after a restart.
    pub fn reopen(&self) -> SyncEngine<FileStore> {
        let store = FileStore::open(&self.path()).expect("Failed to reopen file store");
        SyncEngine::new(EngineConfig::new(TEST_APP_ID), store)
    }
}

impl<S: EntityStore> std::ops::Deref for TestEngine<S> {
    type Target = SyncEngine<S>;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with an engine over an in-memory store.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&SyncEngine<InMemoryStore>) -> R,
{
    let test_engine = TestEngine::memory();
    f(&test_engine.engine)
}

/// Runs a test with an engine over a file store.
pub fn with_file_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine<FileStore>) -> R,
{
    let test_engine = TestEngine::file();
    f(&test_engine)
}

/// Shares an in-memory store between engines or threads.
pub fn shared_memory_engine() -> Arc<SyncEngine<InMemoryStore>> {
    Arc::new(SyncEngine::new(
        EngineConfig::new(TEST_APP_ID),
        InMemoryStore::new(),
    ))
}

/// Root key of kind `Book` named `name` in [`TEST_APP_ID`].
pub fn book_key(name: &str) -> Key {
    Key::root(TEST_APP_ID, None, PathElement::new("Book", name)).expect("valid key")
}

/// Key of a `Chapter` with a client-local id below `parent`.
pub fn chapter_key(parent: &Key, id: u64) -> Key {
    parent
        .child(PathElement::new("Chapter", id))
        .expect("valid key")
}

/// Wire property with the given tag and JSON value.
pub fn wire(tag: &str, value: Json) -> WireProperty {
    WireProperty::new(tag, value)
}

/// Payload for `key` at `version` with no properties.
pub fn payload(key: &Key, version: u64) -> EntityPayload {
    let mut payload = EntityPayload::new(key.kind(), key.to_remote()).with_version(version);
    payload.name = key.name().map(str::to_string);
    payload.id = key.id();
    payload.namespace = key.namespace().map(str::to_string);
    payload
}

/// Payload for `key` at `version` carrying native `properties`.
pub fn payload_with(key: &Key, version: u64, properties: &[(&str, Value)]) -> EntityPayload {
    properties
        .iter()
        .fold(payload(key, version), |payload, (name, value)| {
            payload.with_property(*name, encode_value(value).expect("encodable value"))
        })
}

/// Payload built from a client-side entity.
pub fn payload_of(entity: &Entity, version: u64) -> EntityPayload {
    EntityPayload::from_entity(entity.key(), &entity.key().to_remote(), version, entity)
        .expect("encodable entity")
}

/// A small book payload.
pub fn book(name: &str, version: u64, title: &str) -> EntityPayload {
    payload(&book_key(name), version)
        .with_property("title", wire("string", json!(title)))
        .with_property("pages", wire("int", json!(title.len())))
}

/// Syncs `payload` with its computed content hash.
pub fn sync<S: EntityStore>(
    engine: &SyncEngine<S>,
    payload: &EntityPayload,
) -> SyncResult<SyncEntityResult> {
    engine.sync_entity(payload, ContentHash::compute(payload).as_str(), None)
}

/// Syncs `payload` as `principal` with its computed content hash.
pub fn sync_as<S: EntityStore>(
    engine: &SyncEngine<S>,
    payload: &EntityPayload,
    principal: &str,
) -> SyncResult<SyncEntityResult> {
    engine.sync_entity(
        payload,
        ContentHash::compute(payload).as_str(),
        Some(&Principal::new(principal)),
    )
}

/// Deletes the entity behind `key`.
pub fn delete<S: EntityStore>(engine: &SyncEngine<S>, key: &Key) -> SyncResult<SyncDeletedResult> {
    engine.sync_deleted_entity(&key.to_remote(), None)
}
