//! HTTP metrics middleware

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::domain::gateway::CACHE_HIT_HEADER;
use crate::infrastructure::observability::record_http_request;

/// Record request count and duration labelled with the cache marker
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let cache_hit = response
        .headers()
        .get(CACHE_HIT_HEADER)
        .is_some_and(|v| v.as_bytes() == b"true");

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        cache_hit,
        start.elapsed(),
    );

    response
}
