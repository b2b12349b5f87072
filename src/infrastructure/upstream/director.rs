//! Request director: rewrites an inbound request for the upstream target

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use bytes::Bytes;

use crate::domain::gateway::UpstreamRequest;
use crate::domain::DomainError;

/// Headers that describe a single hop and never cross the proxy
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Remove hop-by-hop headers, including any named by `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }

    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Rebases requests onto the upstream and applies its credentials
#[derive(Clone)]
pub struct RequestDirector {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    host: HeaderValue,
    authorization: HeaderValue,
}

impl std::fmt::Debug for RequestDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDirector")
            .field("scheme", &self.scheme)
            .field("authority", &self.authority)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl RequestDirector {
    /// Build a director for an absolute `http(s)` target URL
    pub fn new(target_url: &str, api_key: &str) -> Result<Self, DomainError> {
        let target: Uri = target_url.trim().parse().map_err(|e| {
            DomainError::configuration(format!("Invalid upstream target '{}': {}", target_url, e))
        })?;

        let scheme = target.scheme().cloned().ok_or_else(|| {
            DomainError::configuration(format!("Upstream target '{}' has no scheme", target_url))
        })?;

        if scheme != Scheme::HTTP && scheme != Scheme::HTTPS {
            return Err(DomainError::configuration(format!(
                "Upstream target '{}' must use http or https",
                target_url
            )));
        }

        let authority = target.authority().cloned().ok_or_else(|| {
            DomainError::configuration(format!("Upstream target '{}' has no host", target_url))
        })?;

        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid upstream host: {}", e)))?;

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| DomainError::configuration(format!("Invalid upstream API key: {}", e)))?;
        authorization.set_sensitive(true);

        Ok(Self {
            scheme,
            authority,
            base_path: target.path().trim_end_matches('/').to_string(),
            host,
            authorization,
        })
    }

    pub fn target_host(&self) -> &str {
        self.authority.as_str()
    }

    /// Rewrite an inbound request into an upstream request
    ///
    /// Method, path, query and body are kept; the path is joined onto the
    /// target's base path.
    pub fn direct(
        &self,
        method: Method,
        uri: &Uri,
        mut headers: HeaderMap,
        body: Bytes,
        client_ip: Option<&str>,
    ) -> Result<UpstreamRequest, DomainError> {
        let path_and_query = uri.path_and_query().map(PathAndQuery::as_str).unwrap_or("/");
        let joined: PathAndQuery = format!("{}{}", self.base_path, path_and_query)
            .parse()
            .map_err(|e| DomainError::validation(format!("Invalid request path: {}", e)))?;

        let upstream_uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(joined)
            .build()
            .map_err(|e| DomainError::internal(format!("Failed to build upstream URI: {}", e)))?;

        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        headers.insert(header::HOST, self.host.clone());
        headers.insert(header::AUTHORIZATION, self.authorization.clone());

        if let Some(ip) = client_ip {
            append_forwarded_for(&mut headers, ip);
        }

        Ok(UpstreamRequest::new(method, upstream_uri, headers, body))
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{}, {}", prior, ip),
        _ => ip.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(director: &RequestDirector, uri: &str, headers: HeaderMap) -> UpstreamRequest {
        director
            .direct(
                Method::POST,
                &uri.parse().unwrap(),
                headers,
                Bytes::from_static(b"{}"),
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_rebases_path_and_query() {
        let director = RequestDirector::new("https://api.deepseek.com", "sk-test").unwrap();

        let request = direct(&director, "/v1/chat/completions?stream=false", HeaderMap::new());

        assert_eq!(
            request.uri.to_string(),
            "https://api.deepseek.com/v1/chat/completions?stream=false"
        );
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Bytes::from_static(b"{}"));
    }

    #[test]
    fn test_joins_target_base_path() {
        let director = RequestDirector::new("http://upstream:8000/api/", "k").unwrap();

        let request = direct(&director, "/v1/models", HeaderMap::new());

        assert_eq!(request.uri.to_string(), "http://upstream:8000/api/v1/models");
    }

    #[test]
    fn test_overrides_credentials_and_host() {
        let director = RequestDirector::new("https://api.example.com", "sk-upstream").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer client-key".parse().unwrap());
        headers.insert(header::HOST, "gateway.local:8080".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

        let request = direct(&director, "/v1/chat/completions", headers);

        assert_eq!(request.headers[header::AUTHORIZATION], "Bearer sk-upstream");
        assert_eq!(request.headers[header::HOST], "api.example.com");
        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(director.target_host(), "api.example.com");
    }

    #[test]
    fn test_strips_hop_by_hop_headers() {
        let director = RequestDirector::new("https://api.example.com", "k").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive, x-session-hop".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("x-session-hop", "1".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::CONTENT_LENGTH, "2".parse().unwrap());
        headers.insert("x-custom", "kept".parse().unwrap());

        let request = direct(&director, "/", headers);

        assert!(request.headers.get(header::CONNECTION).is_none());
        assert!(request.headers.get("keep-alive").is_none());
        assert!(request.headers.get("x-session-hop").is_none());
        assert!(request.headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(request.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(request.headers["x-custom"], "kept");
    }

    #[test]
    fn test_appends_forwarded_for() {
        let director = RequestDirector::new("https://api.example.com", "k").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, "203.0.113.7".parse().unwrap());

        let request = director
            .direct(Method::GET, &"/".parse().unwrap(), headers, Bytes::new(), Some("10.0.0.1"))
            .unwrap();

        assert_eq!(request.headers[X_FORWARDED_FOR], "203.0.113.7, 10.0.0.1");
    }

    #[test]
    fn test_invalid_targets() {
        assert!(RequestDirector::new("", "k").is_err());
        assert!(RequestDirector::new("/relative/only", "k").is_err());
        assert!(RequestDirector::new("ftp://files.example.com", "k").is_err());
        assert!(RequestDirector::new("https://api.example.com", "bad\nkey").is_err());
    }
}
