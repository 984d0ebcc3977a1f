//! Conversion between wire properties and native values.
//!
//! A wire property is a `{"type": <tag>, "value": <json>}` pair. The codec
//! is bound to one application id because `key` values are remote keys and
//! must belong to the serving application.

use crate::error::{CodecError, CodecResult};
use crate::key::Key;
use crate::value::{GeoPt, Principal, TypeTag, Value, MAX_RATING, TIMESTAMP_FORMAT};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// A single property as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProperty {
    /// Registered type tag.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// JSON rendering of the value.
    pub value: Json,
}

impl WireProperty {
    /// Creates a wire property.
    pub fn new(type_tag: impl Into<String>, value: Json) -> Self {
        Self {
            type_tag: type_tag.into(),
            value,
        }
    }
}

/// Wire properties keyed by property name.
pub type WireProperties = BTreeMap<String, WireProperty>;

/// Native properties keyed by property name.
pub type Properties = BTreeMap<String, Value>;

/// Encoder/decoder for property values of one application.
#[derive(Debug, Clone)]
pub struct PropertyCodec {
    app_id: String,
}

impl PropertyCodec {
    /// Creates a codec for the given application.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    /// Returns the application id key values are checked against.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Decodes every property of a wire property map.
    pub fn decode(&self, wire: &WireProperties) -> CodecResult<Properties> {
        wire.iter()
            .map(|(name, prop)| {
                self.decode_property(prop)
                    .map(|value| (name.clone(), value))
                    .map_err(|err| in_property(name, err))
            })
            .collect()
    }

    /// Encodes every property of a native property map.
    pub fn encode(&self, properties: &Properties) -> CodecResult<WireProperties> {
        properties
            .iter()
            .map(|(name, value)| {
                encode_value(value)
                    .map(|prop| (name.clone(), prop))
                    .map_err(|err| in_property(name, err))
            })
            .collect()
    }

    /// Decodes a single wire property.
    ///
    /// A JSON array is a list whose elements all carry the declared tag.
    /// An empty array decodes to an empty list whatever the tag.
    pub fn decode_property(&self, prop: &WireProperty) -> CodecResult<Value> {
        let tag: TypeTag = prop.type_tag.parse()?;
        match &prop.value {
            Json::Array(items) => items
                .iter()
                .map(|item| self.decode_scalar(tag, item))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::List),
            scalar => self.decode_scalar(tag, scalar),
        }
    }

    fn decode_scalar(&self, tag: TypeTag, json: &Json) -> CodecResult<Value> {
        let mismatch = || CodecError::malformed_value(tag.as_str(), format!("unexpected {json}"));
        let text = || json.as_str().ok_or_else(mismatch);

        let value = match tag {
            TypeTag::Null => match json {
                Json::Null => Value::Null,
                _ => return Err(mismatch()),
            },
            TypeTag::String => Value::String(text()?.to_string()),
            TypeTag::Text => Value::Text(text()?.to_string()),
            TypeTag::Email => Value::Email(text()?.to_string()),
            TypeTag::Im => Value::Im(text()?.to_string()),
            TypeTag::PhoneNumber => Value::PhoneNumber(text()?.to_string()),
            TypeTag::PostalAddress => Value::PostalAddress(text()?.to_string()),
            TypeTag::Category => Value::Category(text()?.to_string()),
            TypeTag::Link => Value::Link(text()?.to_string()),
            TypeTag::BlobKey => Value::BlobKey(text()?.to_string()),
            TypeTag::Bool => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
            TypeTag::Int => Value::Int(json.as_i64().ok_or_else(mismatch)?),
            TypeTag::Float => Value::Float(json.as_f64().ok_or_else(mismatch)?),
            TypeTag::ByteString => Value::ByteString(decode_bytes(tag, text()?)?),
            TypeTag::Blob => Value::Blob(decode_bytes(tag, text()?)?),
            TypeTag::When => Value::Timestamp(parse_timestamp(text()?)?),
            TypeTag::Key => Value::Key(Key::from_remote(text()?, &self.app_id)?),
            TypeTag::User => {
                let email = text()?;
                if email.is_empty() {
                    return Err(CodecError::malformed_value(tag.as_str(), "empty user"));
                }
                Value::User(Principal::new(email))
            }
            TypeTag::Rating => {
                let rating = json
                    .as_u64()
                    .filter(|r| *r <= u64::from(MAX_RATING))
                    .ok_or_else(mismatch)?;
                Value::Rating(rating as u8)
            }
            TypeTag::GeoPt => Value::GeoPt(text()?.parse()?),
        };
        Ok(value)
    }
}

/// Encodes a native value as a wire property.
///
/// Lists must be homogeneous and may not nest. Non-finite floats cannot
/// be represented in JSON and are rejected.
pub fn encode_value(value: &Value) -> CodecResult<WireProperty> {
    match value {
        Value::List(items) => {
            let tag = value.type_tag();
            let encoded = items
                .iter()
                .map(|item| match item.scalar_tag() {
                    Some(item_tag) if item_tag == tag => encode_scalar(item),
                    Some(item_tag) => Err(CodecError::malformed_value(
                        tag.as_str(),
                        format!("mixed list contains {item_tag}"),
                    )),
                    None => Err(CodecError::malformed_value(tag.as_str(), "nested list")),
                })
                .collect::<CodecResult<Vec<_>>>()?;
            Ok(WireProperty::new(tag.as_str(), Json::Array(encoded)))
        }
        scalar => Ok(WireProperty::new(
            scalar.type_tag().as_str(),
            encode_scalar(scalar)?,
        )),
    }
}

fn encode_scalar(value: &Value) -> CodecResult<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::String(s)
        | Value::Text(s)
        | Value::Email(s)
        | Value::Im(s)
        | Value::PhoneNumber(s)
        | Value::PostalAddress(s)
        | Value::Category(s)
        | Value::Link(s)
        | Value::BlobKey(s) => Json::String(s.clone()),
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::from(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .ok_or_else(|| CodecError::malformed_value(TypeTag::Float.as_str(), "non-finite"))?,
        Value::ByteString(bytes) | Value::Blob(bytes) => Json::String(STANDARD.encode(bytes)),
        Value::Timestamp(t) => Json::String(format_timestamp(t)),
        Value::Key(key) => Json::String(key.to_remote()),
        Value::User(user) => Json::String(user.email().to_string()),
        Value::Rating(r) => {
            if *r > MAX_RATING {
                return Err(CodecError::malformed_value(
                    TypeTag::Rating.as_str(),
                    format!("{r} out of range"),
                ));
            }
            Json::from(*r)
        }
        Value::GeoPt(point) => Json::String(point.to_string()),
        Value::List(_) => {
            return Err(CodecError::malformed_value(
                TypeTag::Null.as_str(),
                "nested list",
            ))
        }
    };
    Ok(json)
}

/// Formats a timestamp the way clients send it.
pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a `gd:when` timestamp.
///
/// Fields need not be zero padded, so `2010/1/5 7:3:9` is accepted.
pub fn parse_timestamp(s: &str) -> CodecResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .map_err(|err| CodecError::malformed_value(TypeTag::When.as_str(), format!("{s:?}: {err}")))
}

fn decode_bytes(tag: TypeTag, s: &str) -> CodecResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|err| CodecError::malformed_value(tag.as_str(), err.to_string()))
}

fn in_property(name: &str, err: CodecError) -> CodecError {
    match err {
        CodecError::MalformedValue { type_tag, message } => CodecError::MalformedValue {
            type_tag,
            message: format!("property {name:?}: {message}"),
        },
        other => other,
    }
}

/// Convenience for decoding a single point without a codec.
impl TryFrom<&WireProperty> for GeoPt {
    type Error = CodecError;

    fn try_from(prop: &WireProperty) -> CodecResult<Self> {
        match prop.type_tag.parse()? {
            TypeTag::GeoPt => prop
                .value
                .as_str()
                .ok_or_else(|| CodecError::malformed_value(TypeTag::GeoPt.as_str(), "not a string"))?
                .parse(),
            other => Err(CodecError::malformed_value(
                other.as_str(),
                "expected georss:point",
            )),
        }
    }
}
