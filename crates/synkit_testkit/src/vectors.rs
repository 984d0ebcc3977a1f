//! Cross-language test vectors for Synkit.
//!
//! These vectors pin the wire formats browser clients depend on: remote key
//! strings and tagged property values.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use synkit_codec::{CodecError, Key, PathElement, PropertyCodec, WireProperty};

/// A remote key vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Application id the key belongs to.
    pub app_id: String,
    /// Namespace, `None` for the default one.
    pub namespace: Option<String>,
    /// Path as `(kind, id, name)`; both absent for an incomplete terminal.
    pub path: Vec<(String, Option<u64>, Option<String>)>,
    /// Expected base64 remote key.
    pub remote: String,
}

impl KeyVector {
    fn new(
        id: &str,
        app_id: &str,
        namespace: Option<&str>,
        path: &[(&str, Option<u64>, Option<&str>)],
        remote: &str,
    ) -> Self {
        Self {
            id: id.into(),
            app_id: app_id.into(),
            namespace: namespace.map(Into::into),
            path: path
                .iter()
                .map(|(kind, id, name)| (kind.to_string(), *id, name.map(Into::into)))
                .collect(),
            remote: remote.into(),
        }
    }

    /// Builds the key the vector describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the described key is invalid.
    pub fn key(&self) -> Result<Key, CodecError> {
        let path = self
            .path
            .iter()
            .map(|(kind, id, name)| match (id, name) {
                (Some(id), _) => PathElement::new(kind.as_str(), *id),
                (None, Some(name)) => PathElement::new(kind.as_str(), name.as_str()),
                (None, None) => PathElement::incomplete(kind.as_str()),
            })
            .collect();
        Key::new(self.app_id.as_str(), self.namespace.clone(), path)
    }
}

/// Remote key encoding vectors.
pub fn key_vectors() -> Vec<KeyVector> {
    vec![
        KeyVector::new(
            "key_named_root",
            "test",
            None,
            &[("Book", None, Some("catcher"))],
            "dGVzdEBkZWZhdWx0ISFCb29rCGNhdGNoZXI=",
        ),
        KeyVector::new(
            "key_child_with_id",
            "test",
            None,
            &[("Author", None, Some("salinger")), ("Book", Some(42), None)],
            "dGVzdEBkZWZhdWx0ISFBdXRob3IIc2FsaW5nZXIJQm9vawo0Mg==",
        ),
        KeyVector::new(
            "key_namespace",
            "test",
            Some("shelf"),
            &[("Book", Some(7), None)],
            "dGVzdEBzaGVsZiEhQm9vawo3",
        ),
        KeyVector::new(
            "key_incomplete",
            "test",
            None,
            &[("Note", None, None)],
            "dGVzdEBkZWZhdWx0ISFOb3RlCjA=",
        ),
        KeyVector::new(
            "key_name_with_at_and_space",
            "notes",
            None,
            &[
                ("User", None, Some("jd@example.com")),
                ("Note", None, Some("grocery list")),
            ],
            "bm90ZXNAZGVmYXVsdCEhVXNlcghqZEBleGFtcGxlLmNvbQlOb3RlCGdyb2NlcnkgbGlzdA==",
        ),
    ]
}

/// A tagged property vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Property as a client sends it.
    pub input: WireProperty,
    /// Property as the server sends it back; `None` if equal to the input.
    pub canonical: Option<WireProperty>,
    /// Expected error kind (if decoding should fail).
    pub expected_error: Option<String>,
}

impl WireVector {
    fn ok(id: &str, tag: &str, value: Json) -> Self {
        Self {
            id: id.into(),
            input: WireProperty::new(tag, value),
            canonical: None,
            expected_error: None,
        }
    }

    fn canonical(id: &str, tag: &str, value: Json, canonical_tag: &str, canonical: Json) -> Self {
        Self {
            canonical: Some(WireProperty::new(canonical_tag, canonical)),
            ..Self::ok(id, tag, value)
        }
    }

    fn err(id: &str, tag: &str, value: Json, kind: &str) -> Self {
        Self {
            expected_error: Some(kind.into()),
            ..Self::ok(id, tag, value)
        }
    }
}

/// Property value vectors, decoded against application `test`.
pub fn wire_vectors() -> Vec<WireVector> {
    vec![
        WireVector::ok("string", "string", json!("hello")),
        WireVector::ok("text", "text", json!("a long\nstory")),
        WireVector::ok("bool", "bool", json!(true)),
        WireVector::ok("int", "int", json!(-42)),
        WireVector::ok("float", "float", json!(2.5)),
        WireVector::ok("byte_string", "byte_string", json!("AAEC/f7/")),
        WireVector::ok("blob", "blob", json!("aGVsbG8=")),
        WireVector::ok("when", "gd:when", json!("2010/01/05 07:03:09")),
        WireVector::canonical(
            "when_unpadded",
            "gd:when",
            json!("2010/1/5 7:3:9"),
            "gd:when",
            json!("2010/01/05 07:03:09"),
        ),
        WireVector::ok("key", "key", json!("dGVzdEBkZWZhdWx0ISFCb29rCGNhdGNoZXI=")),
        WireVector::ok("user", "user", json!("jd@example.com")),
        WireVector::ok("email", "gd:email", json!("jd@example.com")),
        WireVector::ok("im", "gd:im", json!("xmpp:jd@example.com")),
        WireVector::ok("phone", "gd:phonenumber", json!("+1 555 0100")),
        WireVector::ok("postal", "gd:psotaladdress", json!("1 Main St")),
        WireVector::ok("rating", "gd:rating", json!(100)),
        WireVector::ok("geo", "georss:point", json!("52.5,13.4")),
        WireVector::ok("category", "atom:category", json!("fiction")),
        WireVector::ok("link", "atom:link", json!("https://example.com/")),
        WireVector::ok("blobkey", "blobkey", json!("AMIfv94")),
        WireVector::ok("null", "null", json!(null)),
        WireVector::ok("list", "string", json!(["a", "b"])),
        WireVector::ok("empty_list", "null", json!([])),
        WireVector::canonical("empty_list_any_tag", "int", json!([]), "null", json!([])),
        WireVector::err("unknown_tag", "gd:when2", json!("x"), "UnsupportedType"),
        WireVector::err("rating_too_high", "gd:rating", json!(101), "MalformedValue"),
        WireVector::err("geo_out_of_range", "georss:point", json!("91,0"), "MalformedValue"),
        WireVector::err("bad_base64", "blob", json!("***"), "MalformedValue"),
        WireVector::err("bad_timestamp", "gd:when", json!("yesterday"), "MalformedValue"),
        WireVector::err("int_as_string", "int", json!("1"), "MalformedValue"),
        WireVector::err(
            "foreign_key",
            "key",
            json!("b3RoZXJAZGVmYXVsdCEhQm9vawhjYXRjaGVy"),
            "AccessDenied",
        ),
    ]
}

/// Name of a codec error, as in the RPC `data.kind` field.
pub fn codec_error_kind(err: &CodecError) -> &'static str {
    match err {
        CodecError::MalformedKey { .. } => "MalformedKey",
        CodecError::AccessDenied { .. } => "AccessDenied",
        CodecError::UnsupportedType { .. } => "UnsupportedType",
        CodecError::MalformedValue { .. } => "MalformedValue",
    }
}

/// Checks every vector, returning the ids of those that fail.
pub fn failing_vectors() -> Vec<String> {
    let mut failures = Vec::new();

    for vector in key_vectors() {
        let encodes = vector
            .key()
            .map(|key| key.to_remote() == vector.remote)
            .unwrap_or(false);
        let decodes = Key::from_remote(&vector.remote, &vector.app_id)
            .ok()
            .zip(vector.key().ok())
            .is_some_and(|(decoded, expected)| decoded == expected);
        if !encodes || !decodes {
            failures.push(vector.id);
        }
    }

    let codec = PropertyCodec::new("test");
    for vector in wire_vectors() {
        let outcome = codec
            .decode_property(&vector.input)
            .and_then(|value| synkit_codec::encode_value(&value));
        let passed = match (&outcome, &vector.expected_error) {
            (Ok(encoded), None) => encoded == vector.canonical.as_ref().unwrap_or(&vector.input),
            (Err(err), Some(kind)) => codec_error_kind(err) == kind,
            _ => false,
        };
        if !passed {
            failures.push(vector.id);
        }
    }

    failures
}
