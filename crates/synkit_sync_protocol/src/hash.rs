//! Content hashes.

use crate::payload::EntityPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest of an entity's serialized content.
///
/// The server treats the hash as opaque and only compares it; clients are
/// free to compute it however they like as long as they are consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wraps a client supplied hash.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Computes a hash the way the reference client does: the remote key
    /// followed by every property's `{"type":..,"value":..}` JSON in
    /// property-name order, digested with SHA-256.
    pub fn compute(payload: &EntityPayload) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload.key.as_deref().unwrap_or_default());
        for prop in payload.properties.values() {
            let json = format!(
                "{{\"type\":{},\"value\":{}}}",
                Json::from(prop.type_tag.as_str()),
                prop.value
            );
            hasher.update(json.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl From<&str> for ContentHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use synkit_codec::WireProperty;

    fn payload(title: &str) -> EntityPayload {
        EntityPayload::new("Book", "dGVzdEBkZWZhdWx0ISFCb29rCGNhdGNoZXI=")
            .with_property("title", WireProperty::new("string", json!(title)))
            .with_property("year", WireProperty::new("int", json!(1951)))
    }

    #[test]
    fn compute_is_deterministic() {
        let a = ContentHash::compute(&payload("T"));
        let b = ContentHash::compute(&payload("T"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn compute_ignores_version() {
        let a = ContentHash::compute(&payload("T"));
        let b = ContentHash::compute(&payload("T").with_version(4u64));
        assert_eq!(a, b);
    }

    #[test]
    fn compute_tracks_content() {
        assert_ne!(
            ContentHash::compute(&payload("T")),
            ContentHash::compute(&payload("U"))
        );
    }

    #[test]
    fn matches_manual_digest() {
        let p = EntityPayload::new("Book", "k")
            .with_property("a", WireProperty::new("int", json!(1)));
        let expected = hex::encode(Sha256::digest(b"k{\"type\":\"int\",\"value\":1}"));
        assert_eq!(ContentHash::compute(&p).as_str(), expected);
    }
}
