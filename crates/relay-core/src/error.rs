//! Error types for the relay-core crate

use relay_gateway::GatewayError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors from orchestrator and object operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller input rejected before reaching the backend
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Backend refused completion: missing part, wrong ETag or bad ordering
    #[error("upload integrity error: {0}")]
    UploadIntegrity(#[source] GatewayError),

    /// Completion succeeded but the size lookup failed
    #[error("upload of {key} completed but its metadata could not be read: {source}")]
    MetadataUnavailable {
        key: String,
        #[source]
        source: GatewayError,
    },

    /// Completion was sent but not acknowledged in time. The backend may
    /// have committed the object, so a retry can see `NoSuchUpload`.
    #[error("completion of {key} (upload {upload_id}) was not acknowledged within {waited_ms}ms; the object may already exist")]
    CompletionUnknown {
        key: String,
        upload_id: String,
        waited_ms: u64,
    },

    /// Copy succeeded, deleting the source failed
    #[error("rename incomplete: {new} was written but {old} could not be removed, both keys exist: {source}")]
    RenameIncomplete {
        old: String,
        new: String,
        #[source]
        source: GatewayError,
    },

    /// Any other backend failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CoreError {
    /// Create an invalid-input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// The backend error underneath, if any
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::InvalidInput(_) | Self::CompletionUnknown { .. } => None,
            Self::UploadIntegrity(e) | Self::Gateway(e) => Some(e),
            Self::MetadataUnavailable { source, .. } | Self::RenameIncomplete { source, .. } => {
                Some(source)
            }
        }
    }
}
