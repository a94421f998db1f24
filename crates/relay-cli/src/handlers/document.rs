//! Document handlers: list, remove, rename, share

use crate::error::FlagError;
use crate::response::ApiResponse;
use crate::{ApiError, AppState};
use axum::extract::{rejection::QueryRejection, Query, State};
use chrono::{DateTime, Utc};
use relay_core::ObjectSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters for GET /list-documents
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

/// Query parameters naming one object
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKeyParams {
    pub file_key: String,
}

/// Query parameters for PATCH /rename-document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameParams {
    pub old_file_key: String,
    pub new_file_key: String,
}

/// Query parameters for GET /generate-share-url
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareParams {
    pub file_key: String,
    pub expires_in: Option<u64>,
}

/// One listing entry
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentEntry {
    pub key: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub is_directory: bool,
}

impl From<ObjectSummary> for DocumentEntry {
    fn from(summary: ObjectSummary) -> Self {
        Self {
            key: summary.key,
            size: summary.size,
            last_modified: summary.last_modified,
            etag: summary.etag,
            is_directory: summary.is_directory,
        }
    }
}

/// GET /list-documents?prefix&delimiter - List objects or directory markers
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<ApiResponse<Vec<DocumentEntry>>, ApiError> {
    let Query(params) = params?;

    let objects = state
        .objects
        .list(
            params.prefix.as_deref().unwrap_or_default(),
            params.delimiter.as_deref(),
        )
        .await?;

    Ok(ApiResponse::ok(objects.into_iter().map(DocumentEntry::from).collect()))
}

/// DELETE /remove-document?fileKey - Delete an object
pub async fn remove_document(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FileKeyParams>, QueryRejection>,
) -> Result<ApiResponse<bool>, FlagError> {
    let Query(params) = params?;

    state.objects.remove(&params.file_key).await?;

    Ok(ApiResponse::ok(true))
}

/// PATCH /rename-document?oldFileKey&newFileKey - Move an object
pub async fn rename_document(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RenameParams>, QueryRejection>,
) -> Result<ApiResponse<bool>, FlagError> {
    let Query(params) = params?;

    state
        .objects
        .rename(&params.old_file_key, &params.new_file_key)
        .await?;

    Ok(ApiResponse::ok(true))
}

/// GET /generate-share-url?fileKey&expiresIn - Presigned download link
pub async fn generate_share_url(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ShareParams>, QueryRejection>,
) -> Result<ApiResponse<String>, ApiError> {
    let Query(params) = params?;

    let url = state.objects.share(&params.file_key, params.expires_in).await?;

    Ok(ApiResponse::ok(url))
}
