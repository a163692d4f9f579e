//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering encoding and request validation failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Request is well-formed but carries invalid field values.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Envelope was produced by an incompatible protocol version.
    #[error("unsupported protocol version: expected {expected}, got {got}")]
    VersionMismatch {
        /// Version this build speaks.
        expected: u8,
        /// Version found in the envelope.
        got: u8,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Deserialization(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for ProtocolError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ProtocolError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ProtocolError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ProtocolError::Deserialization(err.to_string())
    }
}
