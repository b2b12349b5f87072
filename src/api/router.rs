use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{logging_middleware, metrics_middleware, rate_limit_middleware};
use super::proxy::proxy_handler;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Build the gateway router
///
/// Operational routes are matched first and skip the rate limiter; every
/// other request falls through to the proxy. Layer order from the outside
/// in: trace, request logging, metrics, rate limiter, proxy.
pub fn create_router(state: AppState, metrics: Option<(PrometheusMetrics, String)>) -> Router {
    let proxy = Router::new()
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .merge(proxy)
        .with_state(state);

    if let Some((metrics, path)) = metrics {
        router = router.merge(create_metrics_router(metrics, &path));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, HeaderMap, Method, Request, StatusCode};
    use bytes::Bytes;
    use tower::ServiceExt;

    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::gateway::{MockUpstreamTransport, UpstreamResponse, CACHE_HIT_HEADER};
    use crate::domain::rate_limit::RateLimitConfig;
    use crate::domain::store::{KeyValueStore, UnavailableStore};
    use crate::domain::DomainError;
    use crate::infrastructure::cache::{CacheManager, CacheManagerConfig};
    use crate::infrastructure::rate_limit::RateLimiter;
    use crate::infrastructure::services::GatewayService;
    use crate::infrastructure::store::InMemoryStore;
    use crate::infrastructure::upstream::{RequestDirector, RetryConfig, RetryingTransport};
    use crate::infrastructure::vector::KvVectorStore;
    use crate::infrastructure::write_back::{WriteBackConfig, WriteBackQueue};

    const CHAT_BODY: &str = r#"{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}"#;
    const COMPLETION: &str = r#"{"choices":[{"message":{"content":"hello"}}]}"#;

    fn app(
        store: Arc<dyn KeyValueStore>,
        transport: MockUpstreamTransport,
        embeddings: MockEmbeddingProvider,
        rate_limit: RateLimitConfig,
    ) -> (Router, AppState) {
        let cache = Arc::new(CacheManager::new(
            store.clone(),
            Arc::new(KvVectorStore::new(store.clone())),
            Arc::new(embeddings),
            CacheManagerConfig::default(),
        ));
        let write_back = Arc::new(WriteBackQueue::start(
            cache.clone(),
            WriteBackConfig::default(),
        ));
        let gateway = GatewayService::new(
            cache,
            RetryingTransport::new(
                Arc::new(transport),
                RetryConfig::new(1, Duration::from_millis(1)),
            ),
            RequestDirector::new("https://api.example.com", "sk-upstream").unwrap(),
            write_back,
        );
        let state = AppState::new(
            Arc::new(gateway),
            Arc::new(RateLimiter::new(store.clone(), rate_limit)),
            store,
        );

        (create_router(state.clone(), None), state)
    }

    fn upstream_ok(times: usize) -> MockUpstreamTransport {
        let mut transport = MockUpstreamTransport::new();
        transport.expect_send().times(times).returning(|_| {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
            Ok(UpstreamResponse::new(
                StatusCode::OK,
                headers,
                Bytes::from_static(COMPLETION.as_bytes()),
            ))
        });
        transport
    }

    fn chat_request() -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(CHAT_BODY))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (router, _) = app(
            Arc::new(InMemoryStore::new()),
            MockUpstreamTransport::new(),
            MockEmbeddingProvider::new(8),
            RateLimitConfig::default(),
        );

        let response = router.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");

        let response = router.clone().oneshot(get_request("/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.oneshot(get_request("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_fails_without_store() {
        let (router, _) = app(
            Arc::new(UnavailableStore),
            MockUpstreamTransport::new(),
            MockEmbeddingProvider::new(8),
            RateLimitConfig::default(),
        );

        let response = router.oneshot(get_request("/ready")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["checks"][0]["name"], "store");
    }

    #[tokio::test]
    async fn test_repeated_prompt_served_from_cache() {
        let (router, state) = app(
            Arc::new(InMemoryStore::new()),
            upstream_ok(1),
            MockEmbeddingProvider::new(8),
            RateLimitConfig::default(),
        );

        let response = router.clone().oneshot(chat_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_HIT_HEADER], "false");
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "4");

        // Let the write-back land before asking again
        assert!(state.gateway.write_back().shutdown().await);

        let response = router.oneshot(chat_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_HIT_HEADER], "true");
        assert_eq!(response.headers()["x-cache-tier"], "exact");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from_static(COMPLETION.as_bytes()));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_over_budget() {
        let (router, _) = app(
            Arc::new(InMemoryStore::new()),
            upstream_ok(2),
            MockEmbeddingProvider::new(8),
            RateLimitConfig::new(2, Duration::from_secs(60)),
        );

        for _ in 0..2 {
            let response = router.clone().oneshot(get_request("/v1/models")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router.clone().oneshot(get_request("/v1/models")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(body_json(response).await["error"]["type"], "rate_limit_error");

        // Operational routes are not counted
        let response = router.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let (router, _) = app(
            Arc::new(UnavailableStore),
            MockUpstreamTransport::new(),
            MockEmbeddingProvider::new(8),
            RateLimitConfig::default(),
        );

        let response = router.oneshot(chat_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let mut transport = MockUpstreamTransport::new();
        transport
            .expect_send()
            .times(2)
            .returning(|_| Err(DomainError::upstream("connection refused")));

        let (router, _) = app(
            Arc::new(InMemoryStore::new()),
            transport,
            MockEmbeddingProvider::new(8),
            RateLimitConfig::default(),
        );

        let response = router.oneshot(chat_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["type"], "upstream_error");
    }

    #[tokio::test]
    async fn test_embedding_failure_does_not_change_response() {
        let (router, _) = app(
            Arc::new(InMemoryStore::new()),
            upstream_ok(1),
            MockEmbeddingProvider::new(8).with_error("embedding service down"),
            RateLimitConfig::default(),
        );

        let response = router.oneshot(chat_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_HIT_HEADER], "false");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from_static(COMPLETION.as_bytes()));
    }
}
