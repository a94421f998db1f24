//! Value types exchanged with callers

use relay_gateway::CompletedPart;
use serde::{Deserialize, Serialize};

/// One in-progress multipart upload.
///
/// The pair is a capability: it cannot be re-derived, so the caller keeps it
/// for the lifetime of the upload and echoes it back on every call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Opaque, backend-issued upload id
    pub upload_id: String,
    /// Key the finished object will occupy
    pub object_key: String,
}

/// A part the client has uploaded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDescriptor {
    /// 1-based part number
    pub part_number: u32,
    /// ETag the backend returned for the part's bytes
    pub etag: String,
}

impl PartDescriptor {
    /// Create a new descriptor
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

impl From<PartDescriptor> for CompletedPart {
    fn from(part: PartDescriptor) -> Self {
        CompletedPart::new(part.part_number, part.etag)
    }
}

/// A short-lived URL authorizing the upload of one part
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPartUrl {
    /// Part number the URL is bound to
    pub part_number: u32,
    /// Presigned PUT URL
    pub url: String,
}

/// Outcome of a completed upload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUpload {
    /// Object key
    pub key: String,
    /// Final object size in bytes
    pub size: u64,
}
