//! Error types, error codes and the failure envelope

use crate::response::ApiResponse;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::CoreError;
use relay_gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;

/// Internal error classes, reported in the `x-relay-error-code` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    SlowDown,
    BackendUnavailable,
    BackendTimeout,
    NoSuchUpload,
    NoSuchKey,
    InvalidPart,
    MetadataUnavailable,
    CompletionUnknown,
    RenameIncomplete,
    BackendRejected,
    InternalError,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "InvalidRequest",
            Self::SlowDown => "SlowDown",
            Self::BackendUnavailable => "BackendUnavailable",
            Self::BackendTimeout => "BackendTimeout",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::NoSuchKey => "NoSuchKey",
            Self::InvalidPart => "InvalidPart",
            Self::MetadataUnavailable => "MetadataUnavailable",
            Self::CompletionUnknown => "CompletionUnknown",
            Self::RenameIncomplete => "RenameIncomplete",
            Self::BackendRejected => "BackendRejected",
            Self::InternalError => "InternalError",
        }
    }

    /// Get the HTTP status code.
    ///
    /// Anything the backend caused stays a 500, which is what existing
    /// upload clients check for.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Api { code: ErrorCode, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    /// Create a new error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Create a bad-request error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::Core(e) => match e {
                CoreError::InvalidInput(_) => ErrorCode::InvalidRequest,
                CoreError::UploadIntegrity(_) => ErrorCode::InvalidPart,
                CoreError::MetadataUnavailable { .. } => ErrorCode::MetadataUnavailable,
                CoreError::CompletionUnknown { .. } => ErrorCode::CompletionUnknown,
                CoreError::RenameIncomplete { .. } => ErrorCode::RenameIncomplete,
                CoreError::Gateway(g) => match g {
                    GatewayError::Unreachable(_) => ErrorCode::BackendUnavailable,
                    GatewayError::Timeout { .. } => ErrorCode::BackendTimeout,
                    GatewayError::NoSuchUpload(_) => ErrorCode::NoSuchUpload,
                    GatewayError::NotFound(_) => ErrorCode::NoSuchKey,
                    GatewayError::InvalidPart(_) | GatewayError::InvalidPartOrder(_) => {
                        ErrorCode::InvalidPart
                    }
                    GatewayError::Rejected { .. } => ErrorCode::BackendRejected,
                    GatewayError::Presign(_) | GatewayError::Configuration(_) => {
                        ErrorCode::InternalError
                    }
                },
            },
        }
    }

    /// Render the envelope with `payload` standing in for the missing result
    fn render<T: Serialize>(self, payload: Option<T>) -> Response {
        let code = self.error_code();
        let status = code.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = code.as_str(), error = %message, "Request failed");
        } else {
            tracing::debug!(code = code.as_str(), error = %message, "Request rejected");
        }

        let mut response = ApiResponse::failure(status, payload, message).into_response();
        response
            .headers_mut()
            .insert("x-relay-error-code", axum::http::HeaderValue::from_static(code.as_str()));
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.render::<()>(None)
    }
}

/// An [`ApiError`] for endpoints whose failure envelope carries `payload: false`
#[derive(Debug)]
pub struct FlagError(pub ApiError);

impl From<ApiError> for FlagError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<CoreError> for FlagError {
    fn from(err: CoreError) -> Self {
        Self(ApiError::Core(err))
    }
}

impl From<QueryRejection> for FlagError {
    fn from(rejection: QueryRejection) -> Self {
        Self(ApiError::from(rejection))
    }
}

impl IntoResponse for FlagError {
    fn into_response(self) -> Response {
        self.0.render(Some(false))
    }
}
