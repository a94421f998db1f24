//! Error types for the relay-gateway crate

use thiserror::Error;

/// Result type alias using `GatewayError`
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors reported by a storage backend
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend could not be reached
    #[error("storage backend unreachable: {0}")]
    Unreachable(String),

    /// Backend call exceeded its deadline
    #[error("storage backend timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Upload id unknown, completed or expired
    #[error("no such upload: {0}")]
    NoSuchUpload(String),

    /// Object missing
    #[error("no such key: {0}")]
    NotFound(String),

    /// Completion referenced a part that was not uploaded or has another ETag
    #[error("invalid part: {0}")]
    InvalidPart(String),

    /// Completion list was not in strictly ascending part order
    #[error("invalid part order: {0}")]
    InvalidPartOrder(String),

    /// Any other refusal by the backend
    #[error("storage backend rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    /// A presigned request could not be produced
    #[error("presign error: {0}")]
    Presign(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Create a rejection error
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the backend refused a completion because the part list is inconsistent
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::InvalidPart(_) | Self::InvalidPartOrder(_))
    }

    /// Whether the failure happened before the backend could answer
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }
}
