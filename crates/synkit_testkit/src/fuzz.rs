//! Fuzz testing harnesses for Synkit.
//!
//! These targets take arbitrary bytes and must never panic. They can be
//! wired into cargo-fuzz or driven by proptest.

use crate::fixtures::{book_key, payload, wire};
use crate::generators::TEST_APP_ID;
use serde_json::{json, Value as Json};
use synkit_codec::{encode_value, Key, PropertyCodec, WireProperty};
use synkit_storage::InMemoryStore;
use synkit_sync_engine::{EngineConfig, SyncEngine};
use synkit_sync_protocol::EntityPayload;

/// Fuzz target for remote key decoding.
///
/// Arbitrary input either fails to decode or decodes to a key that
/// re-encodes to a string decoding to the same key.
pub fn fuzz_remote_key(data: &[u8]) {
    let text = String::from_utf8_lossy(data);
    if let Ok(key) = Key::decode_remote(&text) {
        let again = Key::decode_remote(&key.to_remote());
        assert_eq!(again.ok(), Some(key), "remote key roundtrip mismatch");
    }
}

/// Fuzz target for tagged property decoding.
///
/// Any JSON object that decodes re-encodes and decodes to the same value.
pub fn fuzz_wire_property(data: &[u8]) {
    let Ok(property) = serde_json::from_slice::<WireProperty>(data) else {
        return;
    };
    let codec = PropertyCodec::new(TEST_APP_ID);
    if let Ok(value) = codec.decode_property(&property) {
        let encoded = encode_value(&value).expect("decoded values encode");
        let decoded = codec.decode_property(&encoded).expect("encoded values decode");
        assert_eq!(decoded, value, "property roundtrip mismatch");
    }
}

/// Fuzz target for entity payload parsing.
pub fn fuzz_entity_payload(data: &[u8]) {
    if let Ok(payload) = serde_json::from_slice::<EntityPayload>(data) {
        let _ = payload.decode_key(TEST_APP_ID);
        let _ = payload.decode_properties(&PropertyCodec::new(TEST_APP_ID));
    }
}

/// Fuzz target for request sequences.
///
/// Each 3-byte chunk picks an operation, one of eight keys and a declared
/// version. The engine may reject requests but must never panic, and a
/// record's version never moves backwards.
pub fn fuzz_sync_operations(data: &[u8]) {
    let engine = SyncEngine::new(EngineConfig::new(TEST_APP_ID), InMemoryStore::new());
    let mut versions = [0u64; 8];

    for chunk in data.chunks_exact(3) {
        let (op, slot, declared) = (chunk[0], usize::from(chunk[1] % 8), u64::from(chunk[2] % 8));
        let key = book_key(&format!("fuzz-{slot}"));
        let remote = key.to_remote();

        match op % 3 {
            0 => {
                let request: EntityPayload = payload(&key, declared)
                    .with_property("op", wire("int", json!(op)));
                let _ = engine.sync_entity(&request, &format!("{op}"), None);
            }
            1 => {
                let _ = engine.sync_entity(&payload(&key, declared), "empty", None);
            }
            _ => {
                let _ = engine.sync_deleted_entity(&remote, None);
                versions[slot] = 0;
            }
        }

        if let Ok(Some(record)) = engine.records().get_by_remote_key(&remote) {
            assert!(record.version() >= versions[slot], "version went backwards");
            versions[slot] = record.version();
        }
    }
}

/// Runs every target on `data`.
pub fn fuzz_all(data: &[u8]) {
    fuzz_remote_key(data);
    fuzz_wire_property(data);
    fuzz_entity_payload(data);
    fuzz_sync_operations(data);
}

/// JSON shaped like a property, for seeding corpora.
pub fn seed_properties() -> Vec<Json> {
    crate::vectors::wire_vectors()
        .into_iter()
        .map(|vector| serde_json::to_value(vector.input).unwrap_or(Json::Null))
        .collect()
}
