//! Error types for lrpc.
//!
//! Server-side variants are all transport failures: they are raised before a
//! handler runs (routing, decoding, body I/O) or while writing its result.
//! Failures reported by a handler itself are not errors at this level, see
//! [`crate::dispatch::Outcome::Failed`].

use crate::envelope::FailureCode;
use thiserror::Error;

/// Main error type for lrpc.
#[derive(Debug, Error)]
pub enum LrpcError {
    // Dispatch errors
    #[error("no such handler: {path}")]
    NoSuchHandler { path: String },

    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to read request body: {message}")]
    ReadBody { message: String },

    // Listener errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bind address {addr:?}: {message}")]
    InvalidAddress { addr: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("call failed: {message}")]
    CallFailed { message: String },

    #[error("transport failure ({code}): {message}")]
    TransportFailed { code: i32, message: String },
}

/// Result type alias for lrpc operations.
pub type Result<T> = std::result::Result<T, LrpcError>;

impl LrpcError {
    /// The out-of-band failure code reported to callers for this error.
    pub fn failure_code(&self) -> i32 {
        match self {
            LrpcError::CallFailed { .. } => FailureCode::Call.as_i32(),
            LrpcError::TransportFailed { code, .. } => *code,
            _ => FailureCode::Transport.as_i32(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_handler_message() {
        let err = LrpcError::NoSuchHandler {
            path: "/qrpc/master/unknown".to_string(),
        };
        assert!(err.to_string().contains("no such handler"));
        assert_eq!(err.failure_code(), -2);
    }

    #[test]
    fn test_decode_error_is_verbatim() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let expected = source.to_string();
        let err = LrpcError::Decode(source);
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.failure_code(), -2);
    }

    #[test]
    fn test_client_side_codes() {
        let call = LrpcError::CallFailed {
            message: "boom".to_string(),
        };
        assert_eq!(call.failure_code(), -1);

        let transport = LrpcError::TransportFailed {
            code: -2,
            message: "no such handler".to_string(),
        };
        assert_eq!(transport.failure_code(), -2);
    }
}
