//! Error types for the sync server.

use serde_json::json;
use synkit_sync_engine::SyncError;
use synkit_sync_protocol::jsonrpc::{codes, ErrorObject};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request line is not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The JSON is not a JSON-RPC request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request line exceeds the configured size limit.
    #[error("request of {size} bytes exceeds the limit of {limit}")]
    RequestTooLarge {
        /// Size of the request.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// No such method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The method exists but the parameters do not fit it.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The sync engine rejected the request.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON-RPC error code for an engine error kind (see [`SyncError::kind`]).
///
/// Application codes live in `-32001..=-32099`.
pub fn sync_error_code(kind: &str) -> i64 {
    match kind {
        "MalformedKey" => -32001,
        "AccessDenied" => -32002,
        "NotAllowed" => -32003,
        "MissingKey" => -32004,
        "UnsupportedType" => -32005,
        "MalformedValue" => -32006,
        "VersionConflict" => -32007,
        "DeletePartialFailure" => -32008,
        "RecordNotFound" => -32009,
        "UnresolvedParent" => -32010,
        "MissingTarget" => -32011,
        "CorruptRecord" => -32012,
        "StorageError" => -32013,
        _ => -32099,
    }
}

/// Code returned for failed authentication.
pub const AUTHENTICATION_FAILED: i64 = -32020;

impl ServerError {
    /// Creates an invalid params error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns a stable machine-readable name for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Parse(_) => "ParseError",
            ServerError::InvalidRequest(_) => "InvalidRequest",
            ServerError::RequestTooLarge { .. } => "RequestTooLarge",
            ServerError::MethodNotFound(_) => "MethodNotFound",
            ServerError::InvalidParams(_) => "InvalidParams",
            ServerError::AuthenticationFailed(_) => "AuthenticationFailed",
            ServerError::Sync(err) => err.kind(),
            ServerError::Internal(_) | ServerError::Io(_) => "InternalError",
        }
    }

    /// Returns the JSON-RPC error code.
    pub fn code(&self) -> i64 {
        match self {
            ServerError::Parse(_) => codes::PARSE_ERROR,
            ServerError::InvalidRequest(_) | ServerError::RequestTooLarge { .. } => {
                codes::INVALID_REQUEST
            }
            ServerError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            ServerError::InvalidParams(_) => codes::INVALID_PARAMS,
            ServerError::AuthenticationFailed(_) => AUTHENTICATION_FAILED,
            ServerError::Sync(err) => sync_error_code(err.kind()),
            ServerError::Internal(_) | ServerError::Io(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Converts the error into the `error` member of a response.
    ///
    /// `data.kind` always carries [`ServerError::kind`].
    pub fn to_error_object(&self) -> ErrorObject {
        let mut data = json!({ "kind": self.kind() });
        if let ServerError::Sync(SyncError::DeletePartialFailure { stage, .. }) = self {
            data["stage"] = json!(stage.to_string());
        }
        ErrorObject::new(self.code(), self.to_string()).with_data(data)
    }

    /// Returns true if the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::Sync(err) => err.is_client_error(),
            ServerError::Internal(_) | ServerError::Io(_) => false,
            _ => true,
        }
    }

    /// Returns true if this is a server-side failure.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synkit_codec::CodecError;
    use synkit_sync_engine::DeleteStage;

    #[test]
    fn error_classification() {
        assert!(ServerError::invalid_params("bad").is_client_error());
        assert!(ServerError::internal("oops").is_server_error());
        assert!(ServerError::Sync(SyncError::MissingKey).is_client_error());
    }

    #[test]
    fn protocol_codes() {
        assert_eq!(ServerError::Parse("x".into()).code(), -32700);
        assert_eq!(ServerError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(ServerError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(ServerError::invalid_params("x").code(), -32602);
        assert_eq!(ServerError::internal("x").code(), -32603);
    }

    #[test]
    fn sync_errors_carry_kind_and_code() {
        let err = ServerError::from(SyncError::VersionConflict {
            remote_key: "a2V5".into(),
            client: 7,
            stored: 3,
        });
        let object = err.to_error_object();
        assert_eq!(object.code, -32007);
        assert_eq!(object.data, Some(json!({ "kind": "VersionConflict" })));

        let err = ServerError::from(SyncError::from(CodecError::access_denied("test", "other")));
        assert_eq!(err.code(), -32002);
        assert_eq!(err.kind(), "AccessDenied");
    }

    #[test]
    fn application_codes_are_distinct_and_in_range() {
        let kinds = [
            "MalformedKey",
            "AccessDenied",
            "NotAllowed",
            "MissingKey",
            "UnsupportedType",
            "MalformedValue",
            "VersionConflict",
            "DeletePartialFailure",
            "RecordNotFound",
            "UnresolvedParent",
            "MissingTarget",
            "CorruptRecord",
            "StorageError",
        ];
        let mut seen = std::collections::HashSet::new();
        for kind in kinds {
            let code = sync_error_code(kind);
            assert!((-32099..=-32001).contains(&code), "{kind}");
            assert!(seen.insert(code), "{kind}");
        }
    }

    #[test]
    fn partial_delete_reports_stage() {
        let err = ServerError::from(SyncError::DeletePartialFailure {
            remote_key: "a2V5".into(),
            stage: DeleteStage::Record,
            reason: "disk full".into(),
        });
        let data = err.to_error_object().data.unwrap();
        assert_eq!(data["kind"], "DeletePartialFailure");
        assert_eq!(data["stage"], "sync record");
    }
}
