//! reqwest-backed upstream transport

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::gateway::{UpstreamRequest, UpstreamResponse, UpstreamTransport};
use crate::domain::DomainError;

/// Sends upstream requests over a pooled reqwest client
///
/// Redirects are returned to the caller rather than followed.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DomainError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, DomainError> {
        let response = self
            .client
            .request(request.method.clone(), request.uri.to_string())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| DomainError::upstream(format!("Request failed: {}", e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::upstream(format!("Failed to read response body: {}", e)))?;

        Ok(UpstreamResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, Method, StatusCode};
    use bytes::Bytes;
    use wiremock::matchers::{body_string, header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: &str, body: &'static str) -> UpstreamRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer upstream-key".parse().unwrap());

        UpstreamRequest::new(
            Method::POST,
            url.parse().unwrap(),
            headers,
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[tokio::test]
    async fn test_forwards_method_path_query_headers_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(query_param("beta", "1"))
            .and(header_is("authorization", "Bearer upstream-key"))
            .and(body_string(r#"{"messages":[]}"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"id":"cmpl-1"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/v1/chat/completions?beta=1", server.uri());

        let response = transport
            .send(&request(&url, r#"{"messages":[]}"#))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.is_cacheable());
        assert_eq!(response.body, Bytes::from_static(br#"{"id":"cmpl-1"}"#));
    }

    #[tokio::test]
    async fn test_server_error_is_a_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();

        let response = transport.send(&request(&server.uri(), "{}")).await.unwrap();

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.is_retryable());
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();

        let response = transport.send(&request(&server.uri(), "{}")).await.unwrap();

        assert_eq!(response.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_connection_failure_is_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();

        // Nothing listens on the discard port
        let result = transport.send(&request("http://127.0.0.1:9/", "{}")).await;

        assert!(matches!(result, Err(DomainError::Upstream { .. })));
    }
}
