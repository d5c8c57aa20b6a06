//! Request metadata shared by the federation handlers.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Method, Uri, header, request::Parts},
};
use uuid::Uuid;

/// Header carrying a request id assigned by a reverse proxy.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Method, target and headers of an inbound federation request.
#[derive(Debug, Clone)]
pub struct ApRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Correlates audit log lines for this request.
    pub request_id: String,
}

impl ApRequest {
    /// Build from parts, taking the request id from `x-request-id` when present.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
        Self {
            method,
            uri,
            headers,
            request_id,
        }
    }

    /// Path plus query, as signed in `(request-target)`.
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// A header value as a string, if present and valid.
    #[must_use]
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw `Signature` header, falling back to `Authorization: Signature ...`.
    #[must_use]
    pub fn signature_header(&self) -> Option<&str> {
        self.header("signature").or_else(|| {
            self.header(header::AUTHORIZATION)
                .filter(|v| {
                    v.len() > 10 && v.get(..10).is_some_and(|p| p.eq_ignore_ascii_case("signature "))
                })
        })
    }

    /// Whether any form of HTTP signature is attached.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature_header().is_some()
    }
}

impl<S> FromRequestParts<S> for ApRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.headers.clone(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));
        let request = ApRequest::new(Method::GET, "/users/1".parse().unwrap(), headers);
        assert_eq!(request.request_id, "req-1");
    }

    #[test]
    fn test_generated_request_id_and_target() {
        let request = ApRequest::new(
            Method::GET,
            "/users/1/outbox?page=true".parse().unwrap(),
            HeaderMap::new(),
        );
        assert!(Uuid::parse_str(&request.request_id).is_ok());
        assert_eq!(request.path_and_query(), "/users/1/outbox?page=true");
        assert!(!request.is_signed());
    }

    #[test]
    fn test_authorization_signature_form() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Signature keyId=\"k\",signature=\"s\""),
        );
        let request = ApRequest::new(Method::GET, "/".parse().unwrap(), headers);
        assert!(request.is_signed());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let request = ApRequest::new(Method::GET, "/".parse().unwrap(), headers);
        assert!(!request.is_signed());
    }
}
