//! Multipart upload handlers

use crate::response::ApiResponse;
use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use relay_core::PartDescriptor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of POST /initiate-multipart-upload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub file_name: String,
}

/// Body of POST /generate-presigned-urls
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub file_key: String,
    pub file_id: String,
    pub parts: u32,
}

/// Body of POST /complete-multipart-upload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub file_key: String,
    pub file_id: String,
    pub parts: Vec<PartEntry>,
}

/// A part as the upload client reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartEntry {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

impl From<PartEntry> for PartDescriptor {
    fn from(entry: PartEntry) -> Self {
        PartDescriptor::new(entry.part_number, entry.etag)
    }
}

/// Payload of a successful initiate
#[derive(Debug, Serialize, Deserialize)]
pub struct InitiatePayload {
    pub id: String,
    pub key: String,
}

/// One signed part URL
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlPayload {
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
}

/// Payload of a successful completion
#[derive(Debug, Serialize, Deserialize)]
pub struct CompletePayload {
    pub key: String,
    pub size: u64,
}

/// POST /initiate-multipart-upload - Open a multipart session
pub async fn initiate_multipart_upload(
    State(state): State<Arc<AppState>>,
    body: Result<Json<InitiateRequest>, JsonRejection>,
) -> Result<ApiResponse<InitiatePayload>, ApiError> {
    let Json(request) = body?;

    let session = state.orchestrator.initiate(&request.file_name).await?;

    Ok(ApiResponse::ok(InitiatePayload {
        id: session.upload_id,
        key: session.object_key,
    }))
}

/// POST /generate-presigned-urls - Sign one PUT URL per part
pub async fn generate_presigned_urls(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PresignRequest>, JsonRejection>,
) -> Result<ApiResponse<Vec<SignedUrlPayload>>, ApiError> {
    let Json(request) = body?;

    let urls = state
        .orchestrator
        .sign_parts(&request.file_id, &request.file_key, request.parts)
        .await?;

    Ok(ApiResponse::ok(
        urls.into_iter()
            .map(|u| SignedUrlPayload {
                signed_url: u.url,
                part_number: u.part_number,
            })
            .collect(),
    ))
}

/// POST /complete-multipart-upload - Stitch the uploaded parts together
pub async fn complete_multipart_upload(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<ApiResponse<CompletePayload>, ApiError> {
    let Json(request) = body?;

    let parts = request.parts.into_iter().map(PartDescriptor::from).collect();
    let completed = state
        .orchestrator
        .complete(&request.file_id, &request.file_key, parts)
        .await?;

    Ok(ApiResponse::ok(CompletePayload {
        key: completed.key,
        size: completed.size,
    }))
}
