//! Application state

use crate::config::RelayConfig;
use relay_core::{ObjectService, UploadOrchestrator};
use relay_gateway::{MemoryGateway, S3Gateway, StorageGateway};
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers.
///
/// Built once at startup; nothing in here changes while serving.
pub struct AppState {
    /// Relay configuration
    pub config: RelayConfig,
    /// Multipart upload orchestrator
    pub orchestrator: UploadOrchestrator,
    /// Document operations
    pub objects: ObjectService,
    /// Set when running against the in-memory backend, which then also
    /// accepts part uploads itself
    pub memory: Option<MemoryGateway>,
}

impl AppState {
    /// Create a new application state, connecting the configured backend
    pub async fn new(config: RelayConfig) -> anyhow::Result<Self> {
        if config.use_memory_store {
            let gateway = MemoryGateway::with_base_url(config.public_url());
            return Ok(Self::in_memory(config, gateway));
        }

        let gateway = S3Gateway::connect(config.s3.clone()).await?;
        info!(bucket = %gateway.bucket(), "Storage mode: S3");
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// Create a state over the given in-memory backend
    pub fn in_memory(config: RelayConfig, gateway: MemoryGateway) -> Self {
        warn!("Storage mode: in-memory (NOT persistent - for development only)");
        let mut state = Self::with_gateway(config, Arc::new(gateway.clone()));
        state.memory = Some(gateway);
        state
    }

    /// Create a state over any gateway
    pub fn with_gateway(config: RelayConfig, gateway: Arc<dyn StorageGateway>) -> Self {
        let orchestrator = UploadOrchestrator::new(Arc::clone(&gateway), config.orchestrator_config());
        let objects = ObjectService::new(gateway, config.backend_timeout());

        Self {
            config,
            orchestrator,
            objects,
            memory: None,
        }
    }
}
