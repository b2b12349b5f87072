//! Per-client rate limiting middleware
//!
//! Runs before the proxy handler so rejected requests never touch the cache
//! or the upstream.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::rate_limit::{DenyReason, RateLimitDecision};

const LOOPBACK: &str = "127.0.0.1";

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Admit or reject the request against the caller's window
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let trust_forwarded_for = state.rate_limiter.config().trust_forwarded_for;
    let client_id = client_identity(
        request.headers(),
        peer_addr(&request),
        trust_forwarded_for,
    );

    let decision = state.rate_limiter.admit(&client_id).await;

    if !decision.allowed {
        let message = match decision.deny_reason {
            Some(DenyReason::StoreUnavailable) => "Rate limit unavailable, try again later",
            _ => "Rate limit exceeded",
        };

        let mut response = ApiError::rate_limited(message).into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);

        if let Ok(value) = HeaderValue::from_str(&decision.reset_in_seconds.max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        return response;
    }

    debug!(client_id = %client_id, remaining = decision.remaining, "Request admitted");

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Socket peer recorded by `into_make_service_with_connect_info`
pub fn peer_addr(request: &Request<Body>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client identity used as the counter key
///
/// The first `X-Forwarded-For` entry wins when the gateway sits behind a
/// trusted proxy; otherwise the socket peer address is used.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(forwarded) = forwarded {
            return normalize_client_ip(forwarded);
        }
    }

    peer.map(|addr| normalize_client_ip(&addr.ip().to_string()))
        .unwrap_or_else(|| LOOPBACK.to_string())
}

/// Collapse loopback spellings so local callers share one counter
pub fn normalize_client_ip(raw: &str) -> String {
    let raw = raw.trim();

    if raw.is_empty() {
        return LOOPBACK.to_string();
    }

    match raw.parse::<IpAddr>() {
        Ok(ip) if ip.is_loopback() => LOOPBACK.to_string(),
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Ok(ip) => ip.to_string(),
        Err(_) => raw.to_string(),
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    // Disabled limiter reports an unbounded budget; nothing useful to expose
    if decision.limit == u64::MAX {
        return;
    }

    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from(decision.reset_in_seconds));
}
