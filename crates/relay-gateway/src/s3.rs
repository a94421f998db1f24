//! S3-compatible storage gateway backed by `aws-sdk-s3`

use crate::{
    CompletedPart, GatewayError, ObjectStat, ObjectSummary, Result, StorageGateway,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Builder, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart},
    Client,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for an S3-compatible backend
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Settings {
    /// Endpoint override (MinIO, R2, ...). `None` uses the AWS endpoint for the region
    pub endpoint: Option<String>,
    /// Region
    pub region: String,
    /// Bucket all keys live in
    pub bucket: String,
    /// Static access key id
    pub access_key_id: Option<String>,
    /// Static secret access key
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl S3Settings {
    /// Settings for `bucket` in the default region
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Set the endpoint override
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Use static credentials instead of the default provider chain
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(GatewayError::Configuration("bucket name is required".to_string()));
        }
        if self.region.trim().is_empty() {
            return Err(GatewayError::Configuration("region is required".to_string()));
        }
        Ok(())
    }

    fn static_credentials(&self) -> Option<Credentials> {
        let id = self.access_key_id.as_deref().filter(|v| !v.is_empty())?;
        let secret = self.secret_access_key.as_deref().filter(|v| !v.is_empty())?;
        Some(Credentials::new(id, secret, None, None, "relay-static"))
    }
}

/// Gateway over a single S3 bucket
#[derive(Clone, Debug)]
pub struct S3Gateway {
    client: Client,
    bucket: String,
}

impl S3Gateway {
    /// Build the SDK client for `settings`.
    ///
    /// Static credentials are used when both keys are present, otherwise the
    /// default AWS provider chain is loaded. Path-style addressing is always on.
    pub async fn connect(settings: S3Settings) -> Result<Self> {
        settings.validate()?;

        let region = Region::new(settings.region.clone());
        let mut builder = match settings.static_credentials() {
            Some(credentials) => Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(credentials),
            None => {
                debug!("No static credentials configured, loading default provider chain");
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        builder = builder.force_path_style(true);
        if let Some(endpoint) = settings.endpoint.as_deref().filter(|e| !e.is_empty()) {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = settings.endpoint.as_deref().unwrap_or("aws"),
            "S3 gateway configured"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket,
        })
    }

    /// Bucket this gateway writes to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn presigning(ttl: Duration) -> Result<PresigningConfig> {
    PresigningConfig::expires_in(ttl).map_err(|e| GatewayError::Presign(e.to_string()))
}

/// Map an SDK failure onto the gateway taxonomy.
///
/// `subject` names the key or upload the call was about.
fn classify<E, R>(err: SdkError<E, R>, subject: &str) -> GatewayError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            GatewayError::Unreachable(DisplayErrorContext(&err).to_string())
        }
        SdkError::ServiceError(service) => {
            let inner = service.err();
            let code = inner.code().unwrap_or("Unknown");
            let message = inner
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} ({})", code, subject));
            match code {
                "NoSuchUpload" => GatewayError::NoSuchUpload(subject.to_string()),
                "NoSuchKey" | "NotFound" => GatewayError::NotFound(subject.to_string()),
                "InvalidPart" | "EntityTooSmall" => GatewayError::InvalidPart(message),
                "InvalidPartOrder" => GatewayError::InvalidPartOrder(message),
                _ => GatewayError::rejected(code, message),
            }
        }
        _ => GatewayError::rejected("Unknown", DisplayErrorContext(&err).to_string()),
    }
}

#[async_trait]
impl StorageGateway for S3Gateway {
    async fn create_session(&self, key: &str) -> Result<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::rejected("MissingUploadId", "backend returned no upload id"))
    }

    async fn sign_part_url(
        &self,
        upload_id: &str,
        key: &str,
        part_number: u32,
        ttl: Duration,
    ) -> Result<String> {
        let part_number = i32::try_from(part_number)
            .map_err(|_| GatewayError::Presign(format!("part number {} out of range", part_number)))?;

        let request = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning(ttl)?)
            .await
            .map_err(|e| GatewayError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn complete_session(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let mut completed = Vec::with_capacity(parts.len());
        for part in parts {
            let part_number = i32::try_from(part.part_number).map_err(|_| {
                GatewayError::InvalidPart(format!("part number {} out of range", part.part_number))
            })?;
            completed.push(
                S3CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(&part.etag)
                    .build(),
            );
        }

        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| classify(e, upload_id))?;

        Ok(())
    }

    async fn stat_object(&self, key: &str) -> Result<ObjectStat> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        let size = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or_default();
        Ok(ObjectStat { size })
    }

    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Vec<ObjectSummary>> {
        let delimiter = delimiter.filter(|d| !d.is_empty()).map(str::to_string);
        let mut summaries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_delimiter(delimiter.clone())
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| classify(e, prefix))?;

            for object in output.contents() {
                let Some(key) = object.key() else { continue };
                let size = object
                    .size()
                    .and_then(|s| u64::try_from(s).ok())
                    .unwrap_or_default();
                let mut summary = ObjectSummary::new(key, size);
                if let Some(modified) = object
                    .last_modified()
                    .and_then(|m| DateTime::from_timestamp(m.secs(), m.subsec_nanos()))
                {
                    summary = summary.with_last_modified(modified);
                }
                if let Some(etag) = object.e_tag() {
                    summary = summary.with_etag(etag);
                }
                summaries.push(summary);
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(summaries)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        Ok(())
    }

    async fn copy_object(&self, src: &str, dst: &str) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{}/{}", self.bucket, urlencoding::encode(src)))
            .bucket(&self.bucket)
            .key(dst)
            .send()
            .await
            .map_err(|e| classify(e, src))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning(ttl)?)
            .await
            .map_err(|e| GatewayError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }
}
