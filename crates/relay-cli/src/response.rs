//! Response envelope shared by every endpoint

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// `{status, payload, error?}` envelope; `status` mirrors the HTTP status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub payload: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful envelope
    pub fn ok(payload: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            payload: Some(payload),
            error: None,
        }
    }

    /// Failed envelope
    pub fn failure(status: StatusCode, payload: Option<T>, error: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            payload,
            error: Some(error.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
