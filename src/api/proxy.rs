//! Catch-all proxy handler
//!
//! Every request not claimed by an operational route lands here and is
//! handed to the gateway service.

use axum::{
    body::{self, Body},
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use super::middleware::{extract_request_id, normalize_client_ip, peer_addr};
use super::state::AppState;
use super::types::ApiError;
use crate::infrastructure::services::{GatewayResponse, InboundRequest};

/// Largest request body the gateway buffers
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = extract_request_id(request.headers());
    let client_ip = peer_addr(&request).map(|addr| normalize_client_ip(&addr.ip().to_string()));

    let (parts, body) = request.into_parts();

    let body = match body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return ApiError::bad_request("Failed to read request body").into_response();
        }
    };

    let inbound = InboundRequest {
        request_id: request_id.clone(),
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
        client_ip,
    };

    match state.gateway.handle(inbound).await {
        Ok(response) => into_http_response(response),
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Gateway request failed");
            ApiError::from(e).into_response()
        }
    }
}

fn into_http_response(gateway: GatewayResponse) -> Response {
    let mut response = Response::new(Body::from(gateway.body));
    *response.status_mut() = gateway.status;
    *response.headers_mut() = gateway.headers;
    response
}
