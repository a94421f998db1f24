//! Part upload target for the in-memory backend.
//!
//! Signed part URLs handed out in memory mode point back at this server,
//! so a browser client can run the whole upload flow without S3. Share
//! links point here too.

use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use relay_core::CoreError;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters carried by an in-memory signed part URL
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPartParams {
    pub upload_id: String,
    pub part_number: u32,
}

/// PUT /_memory/{*key}?uploadId&partNumber - Store one part
pub async fn upload_memory_part(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    params: Result<Query<MemoryPartParams>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Query(params) = params?;

    let gateway = state
        .memory
        .as_ref()
        .ok_or_else(|| ApiError::invalid("in-memory part uploads are disabled"))?;

    let etag = gateway
        .put_part(&params.upload_id, &key, params.part_number, body)
        .map_err(CoreError::from)?;

    tracing::debug!(
        upload_id = %params.upload_id,
        part_number = params.part_number,
        "Stored in-memory part"
    );

    Ok((StatusCode::OK, [(header::ETAG, etag)], "").into_response())
}

/// GET /_memory/{*key} - Serve a stored object, as a share link would
pub async fn download_memory_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let gateway = state
        .memory
        .as_ref()
        .ok_or_else(|| ApiError::invalid("in-memory downloads are disabled"))?;

    Ok(match gateway.object(&key) {
        Some(data) => (StatusCode::OK, data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}
