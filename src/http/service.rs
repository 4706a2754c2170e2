//! Admission handler mapping decisions onto HTTP responses.

use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::ratelimit::RateLimiter;

/// Build the router sending every path through the admission check.
pub fn router(rate_limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .fallback(handle_rate_limit)
        .with_state(rate_limiter)
}

/// Whole seconds for a `Retry-After` header, rounded up.
pub fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

#[instrument(skip_all, fields(route = %uri.path()))]
async fn handle_rate_limit(
    State(rate_limiter): State<Arc<RateLimiter>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
) -> Response {
    let Some(ConnectInfo(peer)) = peer else {
        warn!("Received request without a peer address");
        return (StatusCode::BAD_REQUEST, "Client IP not found").into_response();
    };

    let client_key = peer.ip().to_string();
    let decision = rate_limiter.allow_request(&client_key, uri.path());

    if decision.admitted {
        return (StatusCode::OK, "Request allowed").into_response();
    }

    debug!(
        client = %client_key,
        retry_after = ?decision.retry_after,
        "Rejecting request"
    );
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(
            header::RETRY_AFTER,
            retry_after_secs(decision.retry_after).to_string(),
        )],
        format!("Too many requests. Try again in {:?}", decision.retry_after),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{AlgorithmKind, RouteConfig, RouteTable};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn limiter(limit: u32) -> Arc<RateLimiter> {
        let routes = RouteTable::new([
            RouteConfig::new("/api", limit, Duration::from_secs(60)).unwrap(),
        ])
        .unwrap();
        Arc::new(RateLimiter::new(AlgorithmKind::FixedWindow, &routes))
    }

    fn request(path: &str, peer: Option<&str>) -> Request<Body> {
        let mut request = Request::builder().uri(path).body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::ZERO), 0);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(2)), 2);
        assert_eq!(retry_after_secs(Duration::from_millis(2500)), 3);
    }

    #[tokio::test]
    async fn test_admitted_request() {
        let app = router(limiter(1));
        let response = app
            .oneshot(request("/api", Some("10.0.0.1:5000")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Request allowed");
    }

    #[tokio::test]
    async fn test_rejected_request_has_retry_after() {
        let app = router(limiter(1));

        let first = app
            .clone()
            .oneshot(request("/api", Some("10.0.0.1:5000")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(request("/api", Some("10.0.0.1:5001")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let retry_after: u64 = second
            .headers()
            .get(header::RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
        assert!(body_text(second)
            .await
            .starts_with("Too many requests. Try again in "));
    }

    #[tokio::test]
    async fn test_client_key_is_peer_ip() {
        let rate_limiter = limiter(1);
        let app = router(rate_limiter.clone());

        for peer in ["10.0.0.1:1", "10.0.0.2:1"] {
            let response = app.clone().oneshot(request("/api", Some(peer))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(rate_limiter.client_count(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_path_is_allowed() {
        let app = router(limiter(1));
        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(request("/health", Some("10.0.0.1:5000")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_missing_peer_is_bad_request() {
        let app = router(limiter(1));
        let response = app.oneshot(request("/api", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Client IP not found");
    }
}
