//! JSON-RPC 2.0 envelope.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

/// Standard and application error codes.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Protocol version marker, always `"2.0"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Version {
    /// JSON-RPC 2.0.
    #[default]
    TwoPointZero,
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::TwoPointZero => serializer.serialize_str("2.0"),
        }
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        match version.as_str() {
            "2.0" => Ok(Self::TwoPointZero),
            _ => Err(D::Error::custom("invalid JSON-RPC version")),
        }
    }
}

/// Request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String id.
    String(String),
    /// Numeric id.
    Number(i64),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

/// A method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version.
    pub jsonrpc: Version,
    /// Method name.
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Json>,
    /// Call id; absent for notifications.
    #[serde(default)]
    pub id: Option<RequestId>,
}

impl Request {
    /// Creates a request.
    pub fn new(method: impl Into<String>, params: Vec<Json>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: Version::TwoPointZero,
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }
}

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Numeric error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
    /// Structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
}

impl ErrorObject {
    /// Creates an error without data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data.
    #[must_use]
    pub fn with_data(mut self, data: Json) -> Self {
        self.data = Some(data);
        self
    }
}

/// Either a result or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseBody {
    /// Successful call.
    Result(Json),
    /// Failed call.
    Error(ErrorObject),
}

/// A reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version.
    pub jsonrpc: Version,
    /// Id of the request, `null` if it could not be determined.
    pub id: Option<RequestId>,
    /// Result or error.
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    /// Creates a success response.
    pub fn result(id: Option<RequestId>, result: Json) -> Self {
        Self {
            jsonrpc: Version::TwoPointZero,
            id,
            body: ResponseBody::Result(result),
        }
    }

    /// Creates an error response.
    pub fn error(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self {
            jsonrpc: Version::TwoPointZero,
            id,
            body: ResponseBody::Error(error),
        }
    }

    /// Returns the result, if the call succeeded.
    pub fn as_result(&self) -> Option<&Json> {
        match &self.body {
            ResponseBody::Result(value) => Some(value),
            ResponseBody::Error(_) => None,
        }
    }

    /// Returns the error, if the call failed.
    pub fn as_error(&self) -> Option<&ErrorObject> {
        match &self.body {
            ResponseBody::Result(_) => None,
            ResponseBody::Error(error) => Some(error),
        }
    }
}
