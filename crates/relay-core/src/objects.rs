//! Pass-through operations on stored objects

use crate::orchestrator::{require, within};
use crate::{CoreError, Result};
use relay_gateway::{ObjectSummary, StorageGateway};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Share link lifetime when the caller does not pick one
pub const DEFAULT_SHARE_TTL_SECS: u64 = 3600;

/// Longest lifetime a SigV4 presigned URL may have (7 days)
pub const MAX_SHARE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Listing, deletion, rename and sharing of objects already in the store
#[derive(Clone)]
pub struct ObjectService {
    gateway: Arc<dyn StorageGateway>,
    backend_timeout: Duration,
}

impl ObjectService {
    /// Create a service over `gateway`
    pub fn new(gateway: Arc<dyn StorageGateway>, backend_timeout: Duration) -> Self {
        Self {
            gateway,
            backend_timeout,
        }
    }

    /// List objects under `prefix`.
    ///
    /// With delimiter `/` only directory markers (keys ending in `/`) are
    /// returned; with any other delimiter, or none, only regular objects.
    #[instrument(skip(self))]
    pub async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<ObjectSummary>> {
        let objects = within(self.backend_timeout, async {
            self.gateway
                .list_objects(prefix, delimiter)
                .await
                .map_err(CoreError::from)
        })
        .await?;

        let directories = delimiter == Some("/");
        Ok(objects
            .into_iter()
            .filter(|o| o.key.ends_with('/') == directories)
            .collect())
    }

    /// Delete `key`
    #[instrument(skip(self))]
    pub async fn remove(&self, key: &str) -> Result<()> {
        require("fileKey", key)?;
        within(self.backend_timeout, async {
            self.gateway.delete_object(key).await.map_err(CoreError::from)
        })
        .await?;
        info!("Object removed");
        Ok(())
    }

    /// Move `old_key` to `new_key` by copy, verify, delete.
    ///
    /// The source is only deleted once the copy is confirmed to exist. If
    /// that delete fails both keys remain and `RenameIncomplete` says so.
    #[instrument(skip(self))]
    pub async fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        require("oldFileKey", old_key)?;
        require("newFileKey", new_key)?;
        if old_key == new_key {
            return Err(CoreError::invalid("oldFileKey and newFileKey must differ"));
        }

        within(self.backend_timeout, async {
            self.gateway.copy_object(old_key, new_key).await?;
            self.gateway.stat_object(new_key).await?;

            self.gateway.delete_object(old_key).await.map_err(|source| {
                warn!(error = %source, "Copy written but source delete failed");
                CoreError::RenameIncomplete {
                    old: old_key.to_string(),
                    new: new_key.to_string(),
                    source,
                }
            })
        })
        .await?;

        info!("Object renamed");
        Ok(())
    }

    /// Presign a GET URL for `key`, valid for `expires_in` seconds (default 3600)
    #[instrument(skip(self))]
    pub async fn share(&self, key: &str, expires_in: Option<u64>) -> Result<String> {
        require("fileKey", key)?;
        let secs = expires_in.unwrap_or(DEFAULT_SHARE_TTL_SECS);
        if secs == 0 || secs > MAX_SHARE_TTL_SECS {
            return Err(CoreError::invalid(format!(
                "expiresIn must be between 1 and {} seconds",
                MAX_SHARE_TTL_SECS
            )));
        }

        within(self.backend_timeout, async {
            self.gateway
                .presign_get(key, Duration::from_secs(secs))
                .await
                .map_err(CoreError::from)
        })
        .await
    }
}
