//! HTTP middleware for request ids, logging and rate limiting

use crate::error::{ApiError, ErrorCode};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type
pub type KeyedRateLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

/// Create a rate limiter, or `None` when `requests_per_second` is 0
pub fn create_rate_limiter(requests_per_second: u32) -> Option<Arc<KeyedRateLimiter>> {
    let rate = NonZeroU32::new(requests_per_second)?;
    Some(Arc::new(RateLimiter::keyed(Quota::per_second(rate))))
}

/// Limiter plus the policy for identifying clients
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<KeyedRateLimiter>,
    /// Trust the first `x-forwarded-for` hop (set only behind a proxy that
    /// overwrites the header)
    pub trust_forwarded_for: bool,
}

/// Client identity for rate limiting.
///
/// The peer address, or the first `x-forwarded-for` hop when the proxy is
/// trusted. Requests with neither share the `anonymous` bucket.
fn client_key(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.split(',').next())
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .flatten();

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&request, rate_limit.trust_forwarded_for);

    if rate_limit.limiter.check_key(&client).is_err() {
        return Err(ApiError::new(
            ErrorCode::SlowDown,
            "Please reduce your request rate",
        ));
    }

    Ok(next.run(request).await)
}

/// Request ID extension
#[derive(Clone)]
pub struct RequestId(pub String);

/// Request ID middleware - adds x-request-id header
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    // Query strings are left out: share and rename carry object keys there
    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rate_limiter() {
        let limiter = create_rate_limiter(100).unwrap();

        // First request should pass
        assert!(limiter.check_key(&"client1".to_string()).is_ok());
    }

    #[test]
    fn test_zero_rate_disables_limiter() {
        assert!(create_rate_limiter(0).is_none());
    }

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder();
        if let Some(hops) = forwarded {
            builder = builder.header("x-forwarded-for", hops);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_client_key_defaults_to_peer_address() {
        let request = request_from("198.51.100.4:51234", Some("203.0.113.7"));
        assert_eq!(client_key(&request, false), "198.51.100.4");
    }

    #[test]
    fn test_client_key_uses_first_forwarded_hop_when_trusted() {
        let request = request_from("10.0.0.1:443", Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&request, true), "203.0.113.7");

        let request = request_from("10.0.0.1:443", None);
        assert_eq!(client_key(&request, true), "10.0.0.1");
    }

    #[test]
    fn test_client_key_without_connect_info() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, false), "anonymous");
    }

    #[test]
    fn test_spoofed_header_does_not_bypass_limit() {
        let limiter = create_rate_limiter(1).unwrap();
        let first = client_key(&request_from("198.51.100.4:1000", Some("1.1.1.1")), false);
        let second = client_key(&request_from("198.51.100.4:1001", Some("2.2.2.2")), false);

        assert!(limiter.check_key(&first).is_ok());
        assert!(limiter.check_key(&second).is_err());
    }
}
