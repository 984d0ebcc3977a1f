//! Native property values and their wire type tags.

use crate::error::{CodecError, CodecResult};
use crate::key::Key;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Textual format of `gd:when` timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Upper bound of a `gd:rating` value.
pub const MAX_RATING: u8 = 100;

/// Closed registry of wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    /// `string`
    String,
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `key`
    Key,
    /// `byte_string`
    ByteString,
    /// `text`
    Text,
    /// `blob`
    Blob,
    /// `user`
    User,
    /// `gd:when`
    When,
    /// `gd:email`
    Email,
    /// `gd:im`
    Im,
    /// `gd:phonenumber`
    PhoneNumber,
    /// `gd:psotaladdress` (spelling is part of the wire format)
    PostalAddress,
    /// `gd:rating`
    Rating,
    /// `georss:point`
    GeoPt,
    /// `atom:category`
    Category,
    /// `atom:link`
    Link,
    /// `blobkey`
    BlobKey,
    /// `null`
    Null,
}

impl TypeTag {
    /// Every registered tag.
    pub const ALL: [TypeTag; 20] = [
        TypeTag::String,
        TypeTag::Bool,
        TypeTag::Int,
        TypeTag::Float,
        TypeTag::Key,
        TypeTag::ByteString,
        TypeTag::Text,
        TypeTag::Blob,
        TypeTag::User,
        TypeTag::When,
        TypeTag::Email,
        TypeTag::Im,
        TypeTag::PhoneNumber,
        TypeTag::PostalAddress,
        TypeTag::Rating,
        TypeTag::GeoPt,
        TypeTag::Category,
        TypeTag::Link,
        TypeTag::BlobKey,
        TypeTag::Null,
    ];

    /// Returns the wire spelling of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Key => "key",
            TypeTag::ByteString => "byte_string",
            TypeTag::Text => "text",
            TypeTag::Blob => "blob",
            TypeTag::User => "user",
            TypeTag::When => "gd:when",
            TypeTag::Email => "gd:email",
            TypeTag::Im => "gd:im",
            TypeTag::PhoneNumber => "gd:phonenumber",
            TypeTag::PostalAddress => "gd:psotaladdress",
            TypeTag::Rating => "gd:rating",
            TypeTag::GeoPt => "georss:point",
            TypeTag::Category => "atom:category",
            TypeTag::Link => "atom:link",
            TypeTag::BlobKey => "blobkey",
            TypeTag::Null => "null",
        }
    }
}

impl FromStr for TypeTag {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        TypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| CodecError::unsupported_type(s))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an authenticated user, identified by email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Creates a principal reference.
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    /// Returns the email address.
    pub fn email(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

/// A geographical point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPt {
    lat: f64,
    lon: f64,
}

impl GeoPt {
    /// Creates a point, validating latitude and longitude ranges.
    pub fn new(lat: f64, lon: f64) -> CodecResult<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CodecError::malformed_value(
                TypeTag::GeoPt.as_str(),
                format!("latitude {lat} out of range"),
            ));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CodecError::malformed_value(
                TypeTag::GeoPt.as_str(),
                format!("longitude {lon} out of range"),
            ));
        }
        Ok(Self { lat, lon })
    }

    /// Returns the latitude.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Returns the longitude.
    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl fmt::Display for GeoPt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

impl FromStr for GeoPt {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        let malformed = || CodecError::malformed_value(TypeTag::GeoPt.as_str(), format!("{s:?}"));
        let (lat, lon) = s.split_once(',').ok_or_else(malformed)?;
        let lat = lat.trim().parse().map_err(|_| malformed())?;
        let lon = lon.trim().parse().map_err(|_| malformed())?;
        Self::new(lat, lon)
    }
}

/// A native property value.
///
/// Scalars map one-to-one onto [`TypeTag`]s. `List` holds scalars that all
/// share one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Short unicode string.
    String(String),
    /// Long unicode text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Short opaque byte string.
    ByteString(Vec<u8>),
    /// Long opaque binary.
    Blob(Vec<u8>),
    /// Timestamp with second precision.
    ///
    /// The wire format has no fractional seconds; build values through
    /// `From<NaiveDateTime>`, which drops them.
    Timestamp(NaiveDateTime),
    /// Reference to another entity.
    Key(Key),
    /// Reference to a user.
    User(Principal),
    /// Email address.
    Email(String),
    /// Instant messaging handle.
    Im(String),
    /// Phone number.
    PhoneNumber(String),
    /// Postal address.
    PostalAddress(String),
    /// Rating between 0 and 100.
    Rating(u8),
    /// Geographical point.
    GeoPt(GeoPt),
    /// Category label.
    Category(String),
    /// URL.
    Link(String),
    /// Reference to a stored blob.
    BlobKey(String),
    /// Homogeneous list of scalars.
    List(Vec<Value>),
}

impl Value {
    /// Returns the tag of a scalar value, `None` for lists.
    pub fn scalar_tag(&self) -> Option<TypeTag> {
        let tag = match self {
            Value::Null => TypeTag::Null,
            Value::String(_) => TypeTag::String,
            Value::Text(_) => TypeTag::Text,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::ByteString(_) => TypeTag::ByteString,
            Value::Blob(_) => TypeTag::Blob,
            Value::Timestamp(_) => TypeTag::When,
            Value::Key(_) => TypeTag::Key,
            Value::User(_) => TypeTag::User,
            Value::Email(_) => TypeTag::Email,
            Value::Im(_) => TypeTag::Im,
            Value::PhoneNumber(_) => TypeTag::PhoneNumber,
            Value::PostalAddress(_) => TypeTag::PostalAddress,
            Value::Rating(_) => TypeTag::Rating,
            Value::GeoPt(_) => TypeTag::GeoPt,
            Value::Category(_) => TypeTag::Category,
            Value::Link(_) => TypeTag::Link,
            Value::BlobKey(_) => TypeTag::BlobKey,
            Value::List(_) => return None,
        };
        Some(tag)
    }

    /// Returns the wire tag this value encodes with.
    ///
    /// Lists take the tag of their first element; an empty list encodes
    /// as `null`.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::List(items) => items
                .first()
                .and_then(Value::scalar_tag)
                .unwrap_or(TypeTag::Null),
            scalar => scalar.scalar_tag().unwrap_or(TypeTag::Null),
        }
    }

    /// Returns true if this is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Get this value as a string slice for any string-like variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s)
            | Value::Text(s)
            | Value::Email(s)
            | Value::Im(s)
            | Value::PhoneNumber(s)
            | Value::PostalAddress(s)
            | Value::Category(s)
            | Value::Link(s)
            | Value::BlobKey(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a key, if it is one.
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(key) => Some(key),
            _ => None,
        }
    }

    /// Get this value as a principal, if it is one.
    pub fn as_user(&self) -> Option<&Principal> {
        match self {
            Value::User(user) => Some(user),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::ByteString(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t.with_nanosecond(0).unwrap_or(t))
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Value::Key(key)
    }
}

impl From<Principal> for Value {
    fn from(user: Principal) -> Self {
        Value::User(user)
    }
}

impl From<GeoPt> for Value {
    fn from(point: GeoPt) -> Self {
        Value::GeoPt(point)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
