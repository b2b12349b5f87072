//! Upstream request and response values

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;

/// A fully buffered request bound for the upstream
///
/// The body is held as `Bytes`, so every replay sends identical content.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }
}

/// A fully buffered upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Whether the upstream asked for a retry (429 or any 5xx)
    pub fn is_retryable(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || self.status.is_server_error()
    }

    /// Whether the response declares a JSON content type
    pub fn is_json(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    /// Whether this response may populate the cache
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.is_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: Option<&str>) -> UpstreamResponse {
        let mut headers = HeaderMap::new();

        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, ct.parse().unwrap());
        }

        UpstreamResponse::new(StatusCode::from_u16(status).unwrap(), headers, Bytes::new())
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(response(429, None).is_retryable());
        assert!(response(500, None).is_retryable());
        assert!(response(503, None).is_retryable());
        assert!(response(599, None).is_retryable());

        assert!(!response(200, None).is_retryable());
        assert!(!response(302, None).is_retryable());
        assert!(!response(400, None).is_retryable());
        assert!(!response(404, None).is_retryable());
    }

    #[test]
    fn test_cacheable_requires_200_json() {
        assert!(response(200, Some("application/json")).is_cacheable());
        assert!(response(200, Some("application/json; charset=utf-8")).is_cacheable());

        assert!(!response(200, Some("text/event-stream")).is_cacheable());
        assert!(!response(200, None).is_cacheable());
        assert!(!response(201, Some("application/json")).is_cacheable());
    }

    #[test]
    fn test_path_and_query() {
        let request = UpstreamRequest::new(
            Method::POST,
            "https://api.example.com/v1/chat/completions?x=1".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );

        assert_eq!(request.path_and_query(), "/v1/chat/completions?x=1");
    }
}
