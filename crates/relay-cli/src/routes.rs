//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Service endpoints
        .route("/health", get(handlers::health_check))
        // Upload endpoints
        .route(
            "/initiate-multipart-upload",
            post(handlers::initiate_multipart_upload),
        )
        .route(
            "/generate-presigned-urls",
            post(handlers::generate_presigned_urls),
        )
        .route(
            "/complete-multipart-upload",
            post(handlers::complete_multipart_upload),
        )
        // Document endpoints
        .route("/list-documents", get(handlers::list_documents))
        .route("/remove-document", delete(handlers::remove_document))
        .route("/rename-document", patch(handlers::rename_document))
        .route("/generate-share-url", get(handlers::generate_share_url));

    if state.memory.is_some() {
        router = router.route(
            "/_memory/{*key}",
            put(handlers::upload_memory_part).get(handlers::download_memory_object),
        );
    }

    if let Some(limiter) = middleware::create_rate_limiter(state.config.rate_limit_rps) {
        let rate_limit = middleware::RateLimitState {
            limiter,
            trust_forwarded_for: state.config.trust_forwarded_for,
        };
        router = router.layer(axum_middleware::from_fn_with_state(
            rate_limit,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

/// CORS configuration from the configured origins
fn cors_layer(state: &AppState) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if state.config.cors_any() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}
