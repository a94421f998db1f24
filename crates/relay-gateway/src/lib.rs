//! # Relay Gateway
//!
//! Storage gateway layer for the Relay upload mediator.
//!
//! This crate provides:
//! - **StorageGateway**: the capability trait the orchestrator is written against
//! - **S3Gateway**: implementation backed by `aws-sdk-s3` (AWS, MinIO, R2, ...)
//! - **MemoryGateway**: in-memory backend that honours the same multipart contract
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Upload Orchestrator           │
//! ├─────────────────────────────────────────┤
//! │          StorageGateway Trait           │
//! ├────────────────────┬────────────────────┤
//! │     S3Gateway      │   MemoryGateway    │
//! ├────────────────────┴────────────────────┤
//! │     S3-compatible object store          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_gateway::{S3Gateway, S3Settings, StorageGateway};
//!
//! let gateway = S3Gateway::connect(S3Settings::new("uploads")).await?;
//! let upload_id = gateway.create_session("videos/big.mp4").await?;
//! ```

pub mod error;
pub mod memory;
pub mod s3;

pub use error::{GatewayError, Result};
pub use memory::{GatewayOp, MemoryGateway};
pub use s3::{S3Gateway, S3Settings};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest part number the S3 multipart protocol accepts
pub const MAX_PART_NUMBER: u32 = 10_000;

/// One part as submitted to the backend at completion time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// Part number (1-based)
    pub part_number: u32,
    /// ETag the backend returned when the part bytes were PUT
    pub etag: String,
}

impl CompletedPart {
    /// Create a new completed part
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Result of a metadata lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectStat {
    /// Object size in bytes
    pub size: u64,
}

/// Listing projection of a stored object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// Backend ETag, when reported
    pub etag: Option<String>,
    /// Whether the key is a "directory" marker (ends with `/`)
    pub is_directory: bool,
}

impl ObjectSummary {
    /// Create a summary, deriving the directory flag from the key
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        let is_directory = key.ends_with('/');
        Self {
            key,
            size,
            last_modified: None,
            etag: None,
            is_directory,
        }
    }

    /// Set the modification time
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Set the ETag
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Capability interface over an S3-compatible object store.
///
/// The first four operations are the multipart primitives the orchestrator
/// needs; the rest back the pass-through document endpoints.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Open a multipart session for `key` and return the backend upload id
    async fn create_session(&self, key: &str) -> Result<String>;

    /// Sign a URL that lets the holder PUT exactly one part of the session
    async fn sign_part_url(
        &self,
        upload_id: &str,
        key: &str,
        part_number: u32,
        ttl: Duration,
    ) -> Result<String>;

    /// Ask the backend to stitch `parts` into the final object.
    ///
    /// `parts` is forwarded in the order given.
    async fn complete_session(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Look up object metadata
    async fn stat_object(&self, key: &str) -> Result<ObjectStat>;

    /// List objects under `prefix` (ListObjectsV2 `Contents` only, all pages)
    async fn list_objects(&self, prefix: &str, delimiter: Option<&str>)
        -> Result<Vec<ObjectSummary>>;

    /// Delete an object
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Server-side copy within the bucket
    async fn copy_object(&self, src: &str, dst: &str) -> Result<()>;

    /// Sign a time-limited GET URL for `key`
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String>;
}
