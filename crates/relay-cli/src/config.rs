//! Relay configuration

use relay_core::OrchestratorConfig;
use relay_gateway::S3Settings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relay server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// CORS allowed origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Backend connection settings
    pub s3: S3Settings,
    /// Use the in-memory backend (for testing/development)
    pub use_memory_store: bool,
    /// Externally reachable base URL, used for in-memory signed URLs
    pub public_url: Option<String>,
    /// Lifetime of signed part URLs (seconds)
    pub part_url_ttl_secs: u64,
    /// Concurrent signing calls per request
    pub sign_concurrency: usize,
    /// Deadline for each backend-facing operation (seconds)
    pub backend_timeout_secs: u64,
    /// Deadline for the backend to acknowledge a completion (seconds)
    pub complete_timeout_secs: u64,
    /// Rate limit (requests per second per client, 0 disables)
    pub rate_limit_rps: u32,
    /// Key rate limiting on `x-forwarded-for` (only behind a trusted proxy)
    pub trust_forwarded_for: bool,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec!["*".to_string()],
            s3: S3Settings::new(""),
            use_memory_store: false,
            public_url: None,
            part_url_ttl_secs: 900,
            sign_concurrency: 16,
            backend_timeout_secs: 30,
            complete_timeout_secs: 600,
            rate_limit_rps: 100,
            trust_forwarded_for: false,
            max_body_size: 50 * 1024 * 1024, // 50 MB
        }
    }
}

impl RelayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL clients reach this server on
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.bind_addr()),
        }
    }

    /// Deadline for backend-facing operations
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Orchestrator settings derived from this config
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_part_url_ttl(Duration::from_secs(self.part_url_ttl_secs))
            .with_sign_concurrency(self.sign_concurrency)
            .with_backend_timeout(self.backend_timeout())
            .with_complete_timeout(Duration::from_secs(self.complete_timeout_secs))
    }

    /// Whether any origin may call the API
    pub fn cors_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Split a comma-separated origin list
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
