//! Gateway orchestration service
//!
//! Drives one proxied request through the pipeline: prompt extraction,
//! two-tier cache lookup, upstream forwarding with retries, and handing
//! cacheable responses to the write-back queue.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::domain::cache::{CacheLookup, ResponseCache};
use crate::domain::gateway::{
    extract_prompt, CacheStatus, RequestContext, CACHE_HIT_HEADER, CACHE_TIER_HEADER,
};
use crate::domain::DomainError;
use crate::infrastructure::upstream::{strip_hop_by_hop, RequestDirector, RetryingTransport};
use crate::infrastructure::write_back::{WriteBackJob, WriteBackQueue};

/// A fully buffered inbound request
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Normalized client address, forwarded as `X-Forwarded-For`
    pub client_ip: Option<String>,
}

/// The response the gateway sends back to the client
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache_status: CacheStatus,
}

/// Orchestrates cache, upstream and write-back for each request
#[derive(Debug)]
pub struct GatewayService {
    cache: Arc<dyn ResponseCache>,
    transport: RetryingTransport,
    director: RequestDirector,
    write_back: Arc<WriteBackQueue>,
}

impl GatewayService {
    pub fn new(
        cache: Arc<dyn ResponseCache>,
        transport: RetryingTransport,
        director: RequestDirector,
        write_back: Arc<WriteBackQueue>,
    ) -> Self {
        Self {
            cache,
            transport,
            director,
            write_back,
        }
    }

    pub fn write_back(&self) -> &Arc<WriteBackQueue> {
        &self.write_back
    }

    /// Serve one request from the cache or the upstream
    ///
    /// Only transport failures that survive every retry are errors; any
    /// upstream status is passed through.
    pub async fn handle(&self, request: InboundRequest) -> Result<GatewayResponse, DomainError> {
        let mut ctx = RequestContext::new(
            request.request_id.clone(),
            request.method.clone(),
            request.uri.path(),
        )
        .with_client(request.client_ip.clone());

        if ctx.is_cache_eligible() {
            ctx = ctx.with_prompt(extract_prompt(&request.body));

            if ctx.prompt.is_none() {
                debug!(request_id = %ctx.request_id, "No prompt in request body, bypassing cache");
            }
        }

        if let Some(prompt) = ctx.prompt.as_deref() {
            match self.cache.get_response(prompt).await {
                CacheLookup::Hit { response, tier } => {
                    info!(
                        request_id = %ctx.request_id,
                        path = %ctx.path,
                        tier = %tier,
                        "Serving response from cache"
                    );
                    return Ok(cached_response(response, CacheStatus::Hit(tier)));
                }
                CacheLookup::Miss => ctx.cache_status = CacheStatus::Miss,
            }
        }

        let upstream_request = self.director.direct(
            request.method,
            &request.uri,
            request.headers,
            request.body,
            request.client_ip.as_deref(),
        )?;

        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            client = ctx.client_id.as_deref().unwrap_or("-"),
            target = self.director.target_host(),
            "Forwarding request upstream"
        );

        let upstream = self.transport.forward(&upstream_request).await.map_err(|e| {
            warn!(request_id = %ctx.request_id, error = %e, "Upstream request failed");
            e
        })?;

        if let Some(prompt) = ctx.prompt.take() {
            if upstream.is_cacheable() {
                self.schedule_write_back(&ctx, prompt, &upstream.body).await;
            }
        }

        let mut headers = upstream.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        headers.insert(
            CACHE_HIT_HEADER,
            HeaderValue::from_static(ctx.cache_status.marker()),
        );

        Ok(GatewayResponse {
            status: upstream.status,
            headers,
            body: upstream.body,
            cache_status: ctx.cache_status,
        })
    }

    async fn schedule_write_back(&self, ctx: &RequestContext, prompt: String, body: &Bytes) {
        let Ok(response) = std::str::from_utf8(body) else {
            warn!(request_id = %ctx.request_id, "Upstream body is not UTF-8, skipping cache write");
            return;
        };

        if self
            .write_back
            .enqueue(WriteBackJob::new(prompt, response))
            .await
        {
            debug!(request_id = %ctx.request_id, "Response handed to cache write-back");
        }
    }
}

fn cached_response(body: String, cache_status: CacheStatus) -> GatewayResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_HIT_HEADER, HeaderValue::from_static(cache_status.marker()));

    if let CacheStatus::Hit(tier) = cache_status {
        if let Ok(value) = HeaderValue::from_str(&tier.to_string()) {
            headers.insert(CACHE_TIER_HEADER, value);
        }
    }

    GatewayResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from(body),
        cache_status,
    }
}
