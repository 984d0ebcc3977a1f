//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding keys and property values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The remote key does not match the expected structure.
    #[error("malformed key: {message}")]
    MalformedKey {
        /// Description of the structural problem.
        message: String,
    },

    /// The remote key belongs to a different application.
    #[error("access denied: key belongs to application {found:?}, expected {expected:?}")]
    AccessDenied {
        /// Application id of the serving application.
        expected: String,
        /// Application id embedded in the key.
        found: String,
    },

    /// The wire type tag is not in the registry.
    #[error("unsupported property type: {type_tag}")]
    UnsupportedType {
        /// The offending tag.
        type_tag: String,
    },

    /// A property value does not fit its declared type.
    #[error("malformed value for {type_tag}: {message}")]
    MalformedValue {
        /// The declared type tag.
        type_tag: String,
        /// Description of the mismatch.
        message: String,
    },
}

impl CodecError {
    /// Create a malformed key error.
    pub fn malformed_key(message: impl Into<String>) -> Self {
        Self::MalformedKey {
            message: message.into(),
        }
    }

    /// Create an access denied error.
    pub fn access_denied(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::AccessDenied {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_tag: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_tag: type_tag.into(),
        }
    }

    /// Create a malformed value error.
    pub fn malformed_value(type_tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedValue {
            type_tag: type_tag.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::access_denied("books", "movies");
        let msg = err.to_string();
        assert!(msg.contains("books"));
        assert!(msg.contains("movies"));

        let err = CodecError::malformed_value("gd:rating", "out of range");
        assert_eq!(err.to_string(), "malformed value for gd:rating: out of range");
    }
}
