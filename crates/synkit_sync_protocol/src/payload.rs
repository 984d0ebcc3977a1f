//! The entity payload exchanged by `syncEntity`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use synkit_codec::{
    CodecError, CodecResult, Entity, Key, Properties, PropertyCodec, WireProperties, WireProperty,
    DEFAULT_NAMESPACE,
};

/// Largest version a client may declare.
///
/// Stored versions are signed 64-bit integers and the server adds one to the
/// declared version, so the declared version stays one below `i64::MAX`.
pub const MAX_DECLARED_VERSION: u64 = i64::MAX as u64 - 1;

/// Version a client declares for an entity.
///
/// Clients that have never seen a server version send `0`, `null` or omit
/// the field; all three mean [`ClientVersion::Unsynced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientVersion {
    /// The client has no prior knowledge of the entity.
    #[default]
    Unsynced,
    /// The last server version the client received.
    Known(u64),
}

impl ClientVersion {
    /// Creates a client version from its wire number.
    pub fn new(version: u64) -> Self {
        match version {
            0 => ClientVersion::Unsynced,
            n => ClientVersion::Known(n),
        }
    }

    /// Returns the wire number; `Unsynced` is `0`.
    pub fn as_u64(&self) -> u64 {
        match self {
            ClientVersion::Unsynced => 0,
            ClientVersion::Known(n) => *n,
        }
    }

    /// Returns true if the client has never synced the entity.
    pub fn is_unsynced(&self) -> bool {
        self.as_u64() == 0
    }
}

impl From<u64> for ClientVersion {
    fn from(version: u64) -> Self {
        Self::new(version)
    }
}

impl Serialize for ClientVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.as_u64())
    }
}

impl<'de> Deserialize<'de> for ClientVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?
            .map(ClientVersion::new)
            .unwrap_or_default())
    }
}

/// An entity as the client serializes it.
///
/// ```json
/// {"kind": "Book", "key": "<remote key>", "name": "catcher", "version": 1,
///  "properties": {"title": {"type": "string", "value": "..."}}}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityPayload {
    /// Kind of the entity.
    #[serde(default)]
    pub kind: String,
    /// Remote key string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Key name, when the terminal element is named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Key id, when the terminal element has a numeric id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Namespace, absent for the default namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Declared version.
    #[serde(default)]
    pub version: ClientVersion,
    /// Typed properties.
    #[serde(default)]
    pub properties: WireProperties,
}

impl EntityPayload {
    /// Creates a payload with no properties.
    pub fn new(kind: impl Into<String>, remote_key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: Some(remote_key.into()),
            ..Self::default()
        }
    }

    /// Sets the declared version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<ClientVersion>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds a wire property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, property: WireProperty) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Builds the payload returned to a client for a stored entity.
    ///
    /// Kind, name and id come from the client's key and `remote_key` is the
    /// string the client sent, so the client can match the reply against its
    /// local copy.
    ///
    /// # Errors
    ///
    /// Returns an error if a property value cannot be encoded.
    pub fn from_entity(
        client_key: &Key,
        remote_key: &str,
        version: u64,
        entity: &Entity,
    ) -> CodecResult<Self> {
        let codec = PropertyCodec::new(client_key.app_id());
        Ok(Self {
            kind: client_key.kind().to_string(),
            key: Some(remote_key.to_string()),
            name: client_key.name().map(str::to_string),
            id: client_key.id(),
            namespace: client_key.namespace().map(str::to_string),
            version: ClientVersion::new(version),
            properties: codec.encode(entity.properties())?,
        })
    }

    /// Returns the declared version as a number the server can store and
    /// increment.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedValue`] above [`MAX_DECLARED_VERSION`].
    pub fn declared_version(&self) -> CodecResult<u64> {
        let version = self.version.as_u64();
        if version > MAX_DECLARED_VERSION {
            return Err(CodecError::malformed_value(
                "version",
                format!("{version} exceeds {MAX_DECLARED_VERSION}"),
            ));
        }
        Ok(version)
    }

    /// Returns the remote key, treating an empty string as missing.
    pub fn remote_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// Decodes the remote key and checks it against `kind` and `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedKey`] if the key is missing, cannot be
    /// parsed, or disagrees with the payload, and
    /// [`CodecError::AccessDenied`] if it belongs to another application.
    pub fn decode_key(&self, app_id: &str) -> CodecResult<Key> {
        let remote = self
            .remote_key()
            .ok_or_else(|| CodecError::malformed_key("missing remote key"))?;
        let key = Key::from_remote(remote, app_id)?;

        if key.kind() != self.kind {
            return Err(CodecError::malformed_key(format!(
                "payload kind {:?} does not match key kind {:?}",
                self.kind,
                key.kind()
            )));
        }
        let namespace = self
            .namespace
            .as_deref()
            .filter(|ns| *ns != DEFAULT_NAMESPACE);
        if self.namespace.is_some() && namespace != key.namespace() {
            return Err(CodecError::malformed_key(format!(
                "payload namespace {:?} does not match key namespace {:?}",
                self.namespace,
                key.namespace()
            )));
        }
        Ok(key)
    }

    /// Decodes the properties to native values.
    ///
    /// # Errors
    ///
    /// Returns the first property that fails to decode.
    pub fn decode_properties(&self, codec: &PropertyCodec) -> CodecResult<Properties> {
        codec.decode(&self.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use synkit_codec::{PathElement, Value};

    const CATCHER: &str = "dGVzdEBkZWZhdWx0ISFCb29rCGNhdGNoZXI=";

    #[test]
    fn client_version_wire_forms() {
        let parse = |v: serde_json::Value| -> EntityPayload {
            serde_json::from_value(json!({"kind": "Book", "key": CATCHER, "version": v})).unwrap()
        };
        assert_eq!(parse(json!(0)).version, ClientVersion::Unsynced);
        assert_eq!(parse(json!(null)).version, ClientVersion::Unsynced);
        assert_eq!(parse(json!(3)).version, ClientVersion::Known(3));

        let absent: EntityPayload =
            serde_json::from_value(json!({"kind": "Book", "key": CATCHER})).unwrap();
        assert!(absent.version.is_unsynced());

        assert_eq!(serde_json::to_value(ClientVersion::Unsynced).unwrap(), json!(0));
        assert_eq!(serde_json::to_value(ClientVersion::Known(7)).unwrap(), json!(7));
    }

    #[test]
    fn negative_version_is_rejected() {
        let result: Result<EntityPayload, _> =
            serde_json::from_value(json!({"kind": "Book", "key": CATCHER, "version": -1}));
        assert!(result.is_err());
    }

    #[test]
    fn parses_client_json() {
        let payload: EntityPayload = serde_json::from_value(json!({
            "kind": "Book",
            "key": CATCHER,
            "name": "catcher",
            "version": 1,
            "properties": {"title": {"type": "string", "value": "The Catcher in the Rye"}}
        }))
        .unwrap();

        assert_eq!(payload.remote_key(), Some(CATCHER));
        assert_eq!(payload.name.as_deref(), Some("catcher"));
        let props = payload.decode_properties(&PropertyCodec::new("test")).unwrap();
        assert_eq!(props["title"], Value::from("The Catcher in the Rye"));
    }

    #[test]
    fn empty_key_is_missing() {
        let payload = EntityPayload::new("Book", "");
        assert_eq!(payload.remote_key(), None);
        assert!(payload.decode_key("test").is_err());
    }

    #[test]
    fn decode_key_checks_kind_and_namespace() {
        assert!(EntityPayload::new("Book", CATCHER).decode_key("test").is_ok());

        let err = EntityPayload::new("Author", CATCHER).decode_key("test").unwrap_err();
        assert!(matches!(err, CodecError::MalformedKey { .. }));

        let mut payload = EntityPayload::new("Book", CATCHER);
        payload.namespace = Some("default".into());
        assert!(payload.decode_key("test").is_ok());
        payload.namespace = Some("shelf".into());
        assert!(payload.decode_key("test").is_err());

        let err = EntityPayload::new("Book", CATCHER).decode_key("other").unwrap_err();
        assert!(matches!(err, CodecError::AccessDenied { .. }));
    }

    #[test]
    fn declared_version_is_bounded() {
        let payload = EntityPayload::new("Book", CATCHER).with_version(MAX_DECLARED_VERSION);
        assert_eq!(payload.declared_version().unwrap(), MAX_DECLARED_VERSION);
        assert_eq!(
            EntityPayload::new("Book", CATCHER).declared_version().unwrap(),
            0
        );

        for version in [MAX_DECLARED_VERSION + 1, 1u64 << 63, u64::MAX] {
            let err = EntityPayload::new("Book", CATCHER)
                .with_version(version)
                .declared_version()
                .unwrap_err();
            assert!(matches!(err, CodecError::MalformedValue { .. }));
        }
    }

    #[test]
    fn from_entity_uses_client_key() {
        let client_key = Key::root("test", None, PathElement::new("Book", 3u64)).unwrap();
        let stored_key = client_key.with_id(1001).unwrap();
        let mut entity = Entity::new(stored_key);
        entity.set("title", "Nine Stories");

        let sent = format!("{}\n", client_key.to_remote());
        let payload = EntityPayload::from_entity(&client_key, &sent, 2, &entity).unwrap();
        assert_eq!(payload.key, Some(sent));
        assert_eq!(payload.id, Some(3));
        assert_eq!(payload.name, None);
        assert_eq!(payload.version, ClientVersion::Known(2));
        assert_eq!(
            serde_json::to_value(&payload.properties).unwrap(),
            json!({"title": {"type": "string", "value": "Nine Stories"}})
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn client_version_wire_roundtrip(n in any::<u64>()) {
                let version = ClientVersion::new(n);
                prop_assert_eq!(version.as_u64(), n);
                let text = serde_json::to_string(&version).unwrap();
                let parsed: ClientVersion = serde_json::from_str(&text).unwrap();
                prop_assert_eq!(parsed, version);
            }
        }
    }
}
