//! Multipart upload orchestration
//!
//! The orchestrator turns one large upload into three server-authorized
//! steps. The client moves the bytes itself, straight to the backend, using
//! the signed part URLs; this process never sees file contents.

use crate::types::{CompletedUpload, PartDescriptor, SignedPartUrl, UploadSession};
use crate::{CoreError, Result};
use futures::{stream, StreamExt, TryStreamExt};
use relay_gateway::{CompletedPart, GatewayError, StorageGateway, MAX_PART_NUMBER};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Orchestrator tuning
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Lifetime of each signed part URL
    pub part_url_ttl: Duration,
    /// Signing calls in flight at once for a single `sign_parts`
    pub sign_concurrency: usize,
    /// Largest part count accepted by `sign_parts`
    pub max_parts: u32,
    /// Deadline for each orchestrator operation, backend calls included
    pub backend_timeout: Duration,
    /// Deadline for the backend to acknowledge a completion. Large uploads
    /// can take minutes to stitch, so this is kept apart from `backend_timeout`
    pub complete_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            part_url_ttl: Duration::from_secs(900),
            sign_concurrency: 16,
            max_parts: MAX_PART_NUMBER,
            backend_timeout: Duration::from_secs(30),
            complete_timeout: Duration::from_secs(600),
        }
    }
}

impl OrchestratorConfig {
    /// Set the signed part URL lifetime
    pub fn with_part_url_ttl(mut self, ttl: Duration) -> Self {
        self.part_url_ttl = ttl;
        self
    }

    /// Set the signing concurrency (at least 1)
    pub fn with_sign_concurrency(mut self, concurrency: usize) -> Self {
        self.sign_concurrency = concurrency.max(1);
        self
    }

    /// Set the maximum part count, capped at the protocol limit
    pub fn with_max_parts(mut self, max_parts: u32) -> Self {
        self.max_parts = max_parts.min(MAX_PART_NUMBER);
        self
    }

    /// Set the per-operation deadline
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Set the completion acknowledgement deadline
    pub fn with_complete_timeout(mut self, timeout: Duration) -> Self {
        self.complete_timeout = timeout;
        self
    }
}

/// Coordinates multipart uploads against a [`StorageGateway`]
#[derive(Clone)]
pub struct UploadOrchestrator {
    gateway: Arc<dyn StorageGateway>,
    config: OrchestratorConfig,
}

pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run `operation` under `deadline`. On expiry the future is dropped, which
/// cancels any backend calls still in flight.
pub(crate) async fn within<T>(
    deadline: Duration,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| {
            CoreError::Gateway(GatewayError::Timeout {
                millis: millis(deadline),
            })
        })?
}

impl UploadOrchestrator {
    /// Create an orchestrator over `gateway`
    pub fn new(gateway: Arc<dyn StorageGateway>, config: OrchestratorConfig) -> Self {
        Self { gateway, config }
    }

    /// Active configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Open a multipart session for `object_key`.
    ///
    /// No collision check is made; completing over an existing key replaces it.
    #[instrument(skip(self))]
    pub async fn initiate(&self, object_key: &str) -> Result<UploadSession> {
        require("key", object_key)?;

        let upload_id = within(self.config.backend_timeout, async {
            self.gateway
                .create_session(object_key)
                .await
                .map_err(CoreError::from)
        })
        .await?;

        info!(upload_id = %upload_id, "Multipart upload initiated");
        Ok(UploadSession {
            upload_id,
            object_key: object_key.to_string(),
        })
    }

    /// Sign one PUT URL per part number `1..=part_count`, ascending.
    ///
    /// Signing calls run concurrently; any failure fails the whole call.
    /// Signing again is harmless: earlier URLs stay valid and no part state
    /// changes until bytes are PUT.
    #[instrument(skip(self))]
    pub async fn sign_parts(
        &self,
        upload_id: &str,
        object_key: &str,
        part_count: u32,
    ) -> Result<Vec<SignedPartUrl>> {
        require("uploadId", upload_id)?;
        require("key", object_key)?;
        if part_count == 0 {
            return Err(CoreError::invalid("parts must be at least 1"));
        }
        if part_count > self.config.max_parts {
            return Err(CoreError::invalid(format!(
                "parts must not exceed {}",
                self.config.max_parts
            )));
        }

        let gateway = &self.gateway;
        let ttl = self.config.part_url_ttl;
        let signing = stream::iter(1..=part_count)
            .map(|part_number| async move {
                gateway
                    .sign_part_url(upload_id, object_key, part_number, ttl)
                    .await
                    .map(|url| SignedPartUrl { part_number, url })
            })
            .buffer_unordered(self.config.sign_concurrency.max(1))
            .try_collect::<Vec<_>>();

        let mut urls = within(self.config.backend_timeout, async {
            signing.await.map_err(CoreError::from)
        })
        .await?;
        urls.sort_unstable_by_key(|u| u.part_number);

        debug!(count = urls.len(), "Signed part URLs");
        Ok(urls)
    }

    /// Finish the upload and report the final object size.
    ///
    /// Parts are submitted in ascending part-number order whatever order the
    /// caller sent them in. Duplicate part numbers are passed through for the
    /// backend to judge. If the backend does not acknowledge within
    /// `complete_timeout` the outcome is `CompletionUnknown`.
    #[instrument(skip(self, parts), fields(parts = parts.len()))]
    pub async fn complete(
        &self,
        upload_id: &str,
        object_key: &str,
        parts: Vec<PartDescriptor>,
    ) -> Result<CompletedUpload> {
        require("uploadId", upload_id)?;
        require("key", object_key)?;
        if parts.is_empty() {
            return Err(CoreError::invalid("parts must not be empty"));
        }
        for part in &parts {
            if part.part_number == 0 || part.part_number > MAX_PART_NUMBER {
                return Err(CoreError::invalid(format!(
                    "PartNumber {} is outside 1..={}",
                    part.part_number, MAX_PART_NUMBER
                )));
            }
            require("ETag", &part.etag)?;
        }

        let mut ordered: Vec<CompletedPart> = parts.into_iter().map(CompletedPart::from).collect();
        ordered.sort_by_key(|p| p.part_number);

        // The completion request gets its own deadline: once it is sent the
        // backend may commit at any point, so expiry is reported as unknown
        // rather than as a failure.
        let deadline = self.config.complete_timeout;
        tokio::time::timeout(
            deadline,
            self.gateway.complete_session(upload_id, object_key, &ordered),
        )
        .await
        .map_err(|_| {
            warn!(waited_ms = millis(deadline), "Completion not acknowledged in time");
            CoreError::CompletionUnknown {
                key: object_key.to_string(),
                upload_id: upload_id.to_string(),
                waited_ms: millis(deadline),
            }
        })?
        .map_err(|e| {
            if e.is_integrity() {
                CoreError::UploadIntegrity(e)
            } else {
                CoreError::Gateway(e)
            }
        })?;

        info!("Multipart upload completed");

        let stat = tokio::time::timeout(
            self.config.backend_timeout,
            self.gateway.stat_object(object_key),
        )
        .await
        .unwrap_or_else(|_| {
            Err(GatewayError::Timeout {
                millis: millis(self.config.backend_timeout),
            })
        })
        .map_err(|source| {
            warn!(error = %source, "Object stored but size lookup failed");
            CoreError::MetadataUnavailable {
                key: object_key.to_string(),
                source,
            }
        })?;

        Ok(CompletedUpload {
            key: object_key.to_string(),
            size: stat.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use relay_gateway::{GatewayOp, MemoryGateway};
    use rstest::rstest;

    fn orchestrator(gateway: &MemoryGateway) -> UploadOrchestrator {
        UploadOrchestrator::new(Arc::new(gateway.clone()), OrchestratorConfig::default())
    }

    /// Upload `chunks` through the fake backend and return their descriptors
    async fn uploaded(
        gateway: &MemoryGateway,
        session: &UploadSession,
        chunks: &[&'static [u8]],
    ) -> Vec<PartDescriptor> {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let number = i as u32 + 1;
                let etag = gateway
                    .put_part(&session.upload_id, &session.object_key, number, *chunk)
                    .unwrap();
                PartDescriptor::new(number, etag)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_initiate_returns_session() {
        let gateway = MemoryGateway::new();
        let session = orchestrator(&gateway).initiate("videos/a.mp4").await.unwrap();

        assert_eq!(session.object_key, "videos/a.mp4");
        assert!(gateway.has_upload(&session.upload_id));
    }

    #[tokio::test]
    async fn test_initiate_rejects_empty_key_before_backend() {
        let gateway = MemoryGateway::new();
        gateway.fail(GatewayOp::CreateSession);

        let err = orchestrator(&gateway).initiate("").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_initiate_propagates_backend_failure() {
        let gateway = MemoryGateway::new();
        gateway.fail(GatewayOp::CreateSession);

        let err = orchestrator(&gateway).initiate("k").await.unwrap_err();
        assert!(matches!(err, CoreError::Gateway(GatewayError::Unreachable(_))));
        assert_eq!(gateway.upload_count(), 0);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(7)]
    #[case(32)]
    #[tokio::test]
    async fn test_sign_parts_ascending_despite_completion_order(#[case] count: u32) {
        let gateway = MemoryGateway::new().with_sign_delay(Duration::from_millis(40));
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("big.iso").await.unwrap();

        let urls = orchestrator
            .sign_parts(&session.upload_id, &session.object_key, count)
            .await
            .unwrap();

        let numbers: Vec<u32> = urls.iter().map(|u| u.part_number).collect();
        assert_eq!(numbers, (1..=count).collect::<Vec<_>>());
        for url in &urls {
            assert!(url.url.contains(&format!("partNumber={}", url.part_number)));
            assert!(url.url.contains(&session.upload_id));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_sign_parts_yields_exact_sequence(count in 1u32..200, concurrency in 1usize..32) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let gateway = MemoryGateway::new();
            let orchestrator = UploadOrchestrator::new(
                Arc::new(gateway),
                OrchestratorConfig::default().with_sign_concurrency(concurrency),
            );

            let urls = runtime
                .block_on(orchestrator.sign_parts("upload", "key", count))
                .unwrap();

            prop_assert_eq!(urls.len(), count as usize);
            for (i, url) in urls.iter().enumerate() {
                prop_assert_eq!(url.part_number, i as u32 + 1);
            }
        }
    }

    #[tokio::test]
    async fn test_sign_parts_all_or_nothing() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("k").await.unwrap();
        gateway.fail(GatewayOp::SignPart);

        let result = orchestrator.sign_parts(&session.upload_id, "k", 5).await;
        assert!(matches!(result, Err(CoreError::Gateway(_))));
    }

    #[tokio::test]
    async fn test_sign_parts_is_repeatable() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("k").await.unwrap();

        let first = orchestrator.sign_parts(&session.upload_id, "k", 3).await.unwrap();
        let second = orchestrator.sign_parts(&session.upload_id, "k", 3).await.unwrap();

        assert_eq!(first.len(), second.len());
        assert!(gateway.has_upload(&session.upload_id));
    }

    #[rstest]
    #[case(0)]
    #[case(MAX_PART_NUMBER + 1)]
    #[tokio::test]
    async fn test_sign_parts_rejects_part_count(#[case] count: u32) {
        let gateway = MemoryGateway::new();
        let err = orchestrator(&gateway)
            .sign_parts("upload", "key", count)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_complete_submits_sorted_parts() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("docs/report.pdf").await.unwrap();
        let mut parts = uploaded(&gateway, &session, &[b"aaa", b"bb", b"c"]).await;
        parts.reverse();
        parts.swap(0, 1);

        let done = orchestrator
            .complete(&session.upload_id, &session.object_key, parts)
            .await
            .unwrap();

        assert_eq!(done.key, "docs/report.pdf");
        assert_eq!(done.size, 6);
        let submitted: Vec<u32> = gateway.submissions()[0].iter().map(|p| p.part_number).collect();
        assert_eq!(submitted, vec![1, 2, 3]);
        assert_eq!(gateway.object("docs/report.pdf").unwrap().as_ref(), b"aaabbc");
    }

    #[tokio::test]
    async fn test_complete_sorts_example_input() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);

        let _ = orchestrator
            .complete(
                "upload",
                "key",
                vec![
                    PartDescriptor::new(3, "e3"),
                    PartDescriptor::new(1, "e1"),
                    PartDescriptor::new(2, "e2"),
                ],
            )
            .await;

        assert_eq!(
            gateway.submissions()[0],
            vec![
                CompletedPart::new(1, "e1"),
                CompletedPart::new(2, "e2"),
                CompletedPart::new(3, "e3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_passes_duplicates_through() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("k").await.unwrap();
        let parts = uploaded(&gateway, &session, &[b"x"]).await;
        let duplicated = vec![parts[0].clone(), PartDescriptor::new(1, "\"other\"")];

        let err = orchestrator
            .complete(&session.upload_id, "k", duplicated)
            .await
            .unwrap_err();

        assert_eq!(gateway.submissions()[0].len(), 2);
        assert!(matches!(err, CoreError::UploadIntegrity(_)));
    }

    #[tokio::test]
    async fn test_complete_reports_etag_mismatch_as_integrity_error() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("k").await.unwrap();
        uploaded(&gateway, &session, &[b"x", b"y"]).await;

        let err = orchestrator
            .complete(
                &session.upload_id,
                "k",
                vec![PartDescriptor::new(1, "\"nope\""), PartDescriptor::new(2, "\"nope\"")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UploadIntegrity(GatewayError::InvalidPart(_))));
        assert!(!gateway.contains("k"));
    }

    #[test_log::test(tokio::test)]
    async fn test_complete_fails_when_stat_fails() {
        let gateway = MemoryGateway::new();
        let orchestrator = orchestrator(&gateway);
        let session = orchestrator.initiate("k").await.unwrap();
        let parts = uploaded(&gateway, &session, &[b"payload"]).await;
        gateway.fail(GatewayOp::Stat);

        let err = orchestrator
            .complete(&session.upload_id, "k", parts)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::MetadataUnavailable { .. }));
        // The object exists even though the call failed
        assert!(gateway.contains("k"));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![PartDescriptor::new(0, "e")])]
    #[case(vec![PartDescriptor::new(1, "")])]
    #[tokio::test]
    async fn test_complete_rejects_invalid_parts(#[case] parts: Vec<PartDescriptor>) {
        let gateway = MemoryGateway::new();
        let err = orchestrator(&gateway)
            .complete("upload", "key", parts)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(gateway.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_slow_completion_ack_outlasts_backend_timeout() {
        let gateway = MemoryGateway::new().with_complete_delay(Duration::from_millis(200));
        let orchestrator = UploadOrchestrator::new(
            Arc::new(gateway.clone()),
            OrchestratorConfig::default().with_backend_timeout(Duration::from_millis(50)),
        );
        let session = orchestrator.initiate("big.iso").await.unwrap();
        let parts = uploaded(&gateway, &session, &[b"abc", b"de"]).await;

        let completed = orchestrator
            .complete(&session.upload_id, "big.iso", parts)
            .await
            .unwrap();
        assert_eq!(completed.size, 5);
    }

    #[test_log::test(tokio::test)]
    async fn test_unacknowledged_completion_is_reported_unknown() {
        let gateway = MemoryGateway::new().with_complete_delay(Duration::from_millis(500));
        let orchestrator = UploadOrchestrator::new(
            Arc::new(gateway.clone()),
            OrchestratorConfig::default().with_complete_timeout(Duration::from_millis(50)),
        );
        let session = orchestrator.initiate("big.iso").await.unwrap();
        let parts = uploaded(&gateway, &session, &[b"abc"]).await;

        let err = orchestrator
            .complete(&session.upload_id, "big.iso", parts)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CompletionUnknown { waited_ms: 50, .. }));
        assert!(err.to_string().contains("may already exist"));
        assert!(gateway.contains("big.iso"));
    }

    #[tokio::test]
    async fn test_timeout_reports_milliseconds() {
        let err = within(Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "storage backend timed out after 20ms");
    }

    #[tokio::test]
    async fn test_operation_times_out() {
        let gateway = MemoryGateway::new().with_sign_delay(Duration::from_millis(500));
        let orchestrator = UploadOrchestrator::new(
            Arc::new(gateway),
            OrchestratorConfig::default().with_backend_timeout(Duration::from_millis(20)),
        );

        let err = orchestrator.sign_parts("upload", "key", 1).await.unwrap_err();
        assert!(matches!(err, CoreError::Gateway(GatewayError::Timeout { .. })));
    }
}
