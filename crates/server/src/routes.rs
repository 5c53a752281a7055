//! Router construction.
//!
//! Layers, outermost first:
//!
//! ```text
//! allow-headers/allow-methods ─► CorsLayer (wildcard) ─► TraceLayer
//!     ─► TimeoutLayer (408) ─► answer_options ─► route
//! ```
//!
//! `CorsLayer` only emits the allow-headers and allow-methods headers on
//! preflight requests, so the outermost layers stamp `*` onto every response.

use std::time::Duration;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{handlers, state::AppState};

/// Builds the service router with the default request timeout.
pub fn create_router(state: AppState) -> Router {
    create_router_with_timeout(state, Duration::from_secs(30))
}

/// Builds the service router, cancelling any request that runs longer than
/// `request_timeout` with `408 Request Timeout`.
pub fn create_router_with_timeout(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/login", get(handlers::login_get).post(handlers::login_post))
        .route("/tasks", get(handlers::tasks_get).post(handlers::tasks_post))
        .route("/health", get(handlers::health))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(answer_options))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

/// Answers every `OPTIONS` request with an empty 200, whatever the path.
async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use togo_authn::{DEFAULT_TOKEN_TTL, TokenCodec};
    use togo_storage::{MemoryBackend, StorageResult};
    use tower::ServiceExt;

    use super::*;
    use crate::state::HealthProbe;

    /// A backend health check that never completes.
    struct StalledBackend;

    #[async_trait]
    impl HealthProbe for StalledBackend {
        async fn check(&self) -> StorageResult<()> {
            std::future::pending().await
        }
    }

    fn state() -> AppState {
        let codec = TokenCodec::new(b"routes-test-secret", DEFAULT_TOKEN_TTL).unwrap();
        AppState::new(codec, MemoryBackend::new(), 4)
    }

    fn router() -> Router {
        create_router(state())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_options_on_any_path() {
        for uri in ["/tasks", "/login", "/nowhere"] {
            let response = router()
                .oneshot(
                    Request::builder().method(Method::OPTIONS).uri(uri).body(Body::empty()).unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_path_and_wrong_method() {
        let response = router()
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router()
            .oneshot(
                Request::builder().method(Method::DELETE).uri("/tasks").body(Body::empty()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"error":"method not allowed"}"#);
    }

    #[tokio::test]
    async fn test_slow_request_times_out_with_408() {
        let mut state = state();
        state.health = Arc::new(StalledBackend);
        let router = create_router_with_timeout(state, Duration::from_millis(20));

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_allow_headers_present_without_origin() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
    }
}
