//! In-memory storage gateway for tests and local development
//!
//! Emulates the parts of the S3 multipart contract the orchestrator relies
//! on: parts only exist once bytes are PUT, completion demands a strictly
//! ascending list of known parts with matching ETags, and a completed
//! session disappears.

use crate::{CompletedPart, GatewayError, ObjectStat, ObjectSummary, Result, StorageGateway};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Gateway operations that can be made to fail on purpose
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    CreateSession,
    SignPart,
    CompleteSession,
    Stat,
    List,
    Delete,
    Copy,
    PresignGet,
}

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// An in-memory S3 stand-in
#[derive(Clone)]
pub struct MemoryGateway {
    base_url: String,
    objects: Arc<DashMap<String, StoredObject>>,
    uploads: Arc<DashMap<String, PendingUpload>>,
    failures: Arc<Mutex<HashSet<GatewayOp>>>,
    submissions: Arc<Mutex<Vec<Vec<CompletedPart>>>>,
    sign_delay: Option<Duration>,
    complete_delay: Option<Duration>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

impl MemoryGateway {
    /// Create an empty gateway whose signed URLs point at `memory://relay`
    pub fn new() -> Self {
        Self::with_base_url("memory://relay")
    }

    /// Create an empty gateway whose signed URLs start with `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::new(DashMap::new()),
            uploads: Arc::new(DashMap::new()),
            failures: Arc::new(Mutex::new(HashSet::new())),
            submissions: Arc::new(Mutex::new(Vec::new())),
            sign_delay: None,
            complete_delay: None,
        }
    }

    /// Delay each signing call so that higher part numbers finish first.
    ///
    /// Part `n` sleeps `delay / n`, which inverts completion order when the
    /// calls run concurrently.
    pub fn with_sign_delay(mut self, delay: Duration) -> Self {
        self.sign_delay = Some(delay);
        self
    }

    /// Acknowledge completions only after `delay`, once the object is stored
    pub fn with_complete_delay(mut self, delay: Duration) -> Self {
        self.complete_delay = Some(delay);
        self
    }

    /// Object path under the memory routes, each key segment percent-encoded
    fn object_url(&self, key: &str) -> String {
        let path: Vec<_> = key.split('/').map(urlencoding::encode).collect();
        format!("{}/_memory/{}", self.base_url, path.join("/"))
    }

    /// Make every subsequent call of `op` fail with a transport error
    pub fn fail(&self, op: GatewayOp) {
        self.failures.lock().insert(op);
    }

    /// Undo [`fail`](Self::fail)
    pub fn heal(&self, op: GatewayOp) {
        self.failures.lock().remove(&op);
    }

    fn check(&self, op: GatewayOp) -> Result<()> {
        if self.failures.lock().contains(&op) {
            return Err(GatewayError::Unreachable(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }

    /// Store an object directly
    pub fn put_object(&self, key: impl Into<String>, data: impl Into<Bytes>) -> String {
        let data = data.into();
        let etag = md5_hex(&data);
        self.objects.insert(
            key.into(),
            StoredObject {
                data,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );
        etag
    }

    /// Read an object back
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|o| o.data.clone())
    }

    /// Whether `key` exists
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Whether `upload_id` is still open
    pub fn has_upload(&self, upload_id: &str) -> bool {
        self.uploads.contains_key(upload_id)
    }

    /// Number of open multipart sessions
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    /// Every part list ever handed to `complete_session`, in call order
    pub fn submissions(&self) -> Vec<Vec<CompletedPart>> {
        self.submissions.lock().clone()
    }

    /// Accept the bytes of one part, as a PUT to a signed URL would.
    ///
    /// Re-uploading a part number replaces the earlier bytes. Returns the
    /// quoted ETag the client must echo at completion.
    pub fn put_part(
        &self,
        upload_id: &str,
        key: &str,
        part_number: u32,
        data: impl Into<Bytes>,
    ) -> Result<String> {
        let mut upload = self
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| GatewayError::NoSuchUpload(upload_id.to_string()))?;
        if upload.key != key {
            return Err(GatewayError::NoSuchUpload(upload_id.to_string()));
        }
        if part_number == 0 || part_number > crate::MAX_PART_NUMBER {
            return Err(GatewayError::rejected(
                "InvalidArgument",
                format!("part number {} out of range", part_number),
            ));
        }

        let data = data.into();
        let etag = format!("\"{}\"", md5_hex(&data));
        upload.parts.insert(part_number, (etag.clone(), data));
        Ok(etag)
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn create_session(&self, key: &str) -> Result<String> {
        self.check(GatewayOp::CreateSession)?;
        let upload_id = uuid::Uuid::new_v4().simple().to_string();
        self.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn sign_part_url(
        &self,
        upload_id: &str,
        key: &str,
        part_number: u32,
        ttl: Duration,
    ) -> Result<String> {
        if let Some(delay) = self.sign_delay {
            tokio::time::sleep(delay / part_number.max(1)).await;
        }
        self.check(GatewayOp::SignPart)?;
        Ok(format!(
            "{}?uploadId={}&partNumber={}&expires={}",
            self.object_url(key),
            urlencoding::encode(upload_id),
            part_number,
            ttl.as_secs()
        ))
    }

    async fn complete_session(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        self.check(GatewayOp::CompleteSession)?;
        self.submissions.lock().push(parts.to_vec());

        let data = {
            let upload = self
                .uploads
                .get(upload_id)
                .filter(|u| u.key == key)
                .ok_or_else(|| GatewayError::NoSuchUpload(upload_id.to_string()))?;

            if parts.is_empty() {
                return Err(GatewayError::rejected(
                    "MalformedXML",
                    "at least one part is required",
                ));
            }
            if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
                return Err(GatewayError::InvalidPartOrder(
                    "the list of parts was not in ascending order".to_string(),
                ));
            }

            let mut buffer = BytesMut::new();
            for part in parts {
                match upload.parts.get(&part.part_number) {
                    Some((etag, bytes)) if etag.trim_matches('"') == part.etag.trim_matches('"') => {
                        buffer.extend_from_slice(bytes);
                    }
                    _ => {
                        return Err(GatewayError::InvalidPart(format!(
                            "part {} was not uploaded or its ETag does not match",
                            part.part_number
                        )));
                    }
                }
            }
            buffer.freeze()
        };

        let etag_concat: String = parts.iter().map(|p| p.etag.trim_matches('"')).collect();
        let etag = format!("{}-{}", md5_hex(etag_concat.as_bytes()), parts.len());
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                etag,
                last_modified: Utc::now(),
            },
        );
        self.uploads.remove(upload_id);

        if let Some(delay) = self.complete_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn stat_object(&self, key: &str) -> Result<ObjectStat> {
        self.check(GatewayOp::Stat)?;
        self.objects
            .get(key)
            .map(|o| ObjectStat {
                size: o.data.len() as u64,
            })
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))
    }

    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Vec<ObjectSummary>> {
        self.check(GatewayOp::List)?;
        let delimiter = delimiter.filter(|d| !d.is_empty());

        let mut summaries: Vec<ObjectSummary> = self
            .objects
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(prefix)?;
                // Keys below the next delimiter roll up into common prefixes
                if delimiter.is_some_and(|d| rest.contains(d)) {
                    return None;
                }
                Some(
                    ObjectSummary::new(entry.key().clone(), entry.data.len() as u64)
                        .with_last_modified(entry.last_modified)
                        .with_etag(format!("\"{}\"", entry.etag)),
                )
            })
            .collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.check(GatewayOp::Delete)?;
        // S3 deletes are idempotent
        self.objects.remove(key);
        Ok(())
    }

    async fn copy_object(&self, src: &str, dst: &str) -> Result<()> {
        self.check(GatewayOp::Copy)?;
        let object = self
            .objects
            .get(src)
            .map(|o| o.clone())
            .ok_or_else(|| GatewayError::NotFound(src.to_string()))?;
        self.objects.insert(
            dst.to_string(),
            StoredObject {
                last_modified: Utc::now(),
                ..object
            },
        );
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
        self.check(GatewayOp::PresignGet)?;
        Ok(format!("{}?expires={}", self.object_url(key), ttl.as_secs()))
    }
}
