//! Upload relay - multipart upload mediator for S3-compatible storage

use clap::Parser;
use relay_cli::{config::parse_origins, run_server_with_shutdown, RelayConfig};
use relay_gateway::S3Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Multipart upload relay for S3-compatible storage")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Allowed CORS origins, comma separated (`*` allows any)
    #[arg(long, default_value = "*", env = "CORS_ORIGIN")]
    cors_origin: String,

    /// S3 endpoint URL (omit for AWS)
    #[arg(long, env = "S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long, default_value = "us-east-1", env = "S3_REGION")]
    s3_region: String,

    /// Target bucket
    #[arg(long, env = "S3_BUCKET_NAME")]
    s3_bucket: Option<String>,

    /// Access key id (falls back to the AWS credential chain)
    #[arg(long, env = "S3_ACCESS_KEY_ID")]
    s3_access_key_id: Option<String>,

    /// Secret access key
    #[arg(long, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    s3_secret_access_key: Option<String>,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "RELAY_MEMORY_STORE")]
    memory_store: bool,

    /// Base URL clients reach this server on
    #[arg(long, env = "RELAY_PUBLIC_URL")]
    public_url: Option<String>,

    /// Lifetime of signed part URLs in seconds
    #[arg(long, default_value = "900", env = "PART_URL_TTL_SECS")]
    part_url_ttl_secs: u64,

    /// Concurrent signing calls per request
    #[arg(long, default_value = "16", env = "SIGN_CONCURRENCY")]
    sign_concurrency: usize,

    /// Deadline for each backend call in seconds
    #[arg(long, default_value = "30", env = "BACKEND_TIMEOUT_SECS")]
    backend_timeout_secs: u64,

    /// Deadline for the backend to acknowledge a completion in seconds
    #[arg(long, default_value = "600", env = "COMPLETE_TIMEOUT_SECS")]
    complete_timeout_secs: u64,

    /// Requests per second per client (0 disables)
    #[arg(long, default_value = "100", env = "RATE_LIMIT_RPS")]
    rate_limit_rps: u32,

    /// Rate limit on the first `x-forwarded-for` hop instead of the peer address
    #[arg(long, env = "TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "52428800", env = "MAX_BODY_SIZE")]
    max_body_size: usize,

    /// Enable debug logging
    #[arg(short, long, env = "RELAY_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "RELAY_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "relay_cli={0},relay_core={0},relay_gateway={0},tower_http=debug",
            log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting upload relay on {}:{}", args.host, args.port);

    if !args.memory_store && args.s3_bucket.is_none() {
        anyhow::bail!("S3_BUCKET_NAME is required unless RELAY_MEMORY_STORE is set");
    }

    let mut s3 = S3Settings::new(args.s3_bucket.unwrap_or_default()).with_region(args.s3_region);
    if let Some(endpoint) = args.s3_endpoint {
        tracing::info!("S3 endpoint: {}", endpoint);
        s3 = s3.with_endpoint(endpoint);
    }
    if let (Some(id), Some(secret)) = (args.s3_access_key_id, args.s3_secret_access_key) {
        s3 = s3.with_credentials(id, secret);
    }

    let cors_origins = parse_origins(&args.cors_origin);
    if cors_origins.is_empty() {
        anyhow::bail!("CORS_ORIGIN must name at least one origin or `*`");
    }

    // Build configuration
    let config = RelayConfig {
        host: args.host,
        port: args.port,
        cors_origins,
        s3,
        use_memory_store: args.memory_store,
        public_url: args.public_url,
        part_url_ttl_secs: args.part_url_ttl_secs,
        sign_concurrency: args.sign_concurrency,
        backend_timeout_secs: args.backend_timeout_secs,
        complete_timeout_secs: args.complete_timeout_secs,
        rate_limit_rps: args.rate_limit_rps,
        trust_forwarded_for: args.trust_forwarded_for,
        max_body_size: args.max_body_size,
    };

    run_server_with_shutdown(config, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
    })
    .await
}
