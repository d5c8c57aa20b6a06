//! Per-request signature context and rejection reasons.

use axum::http::StatusCode;
use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::request::ApRequest;
use crate::signature::{
    SignatureError, build_signing_string, parse_digest_header, parse_http_date,
    parse_signature_header, sha256_base64,
};

/// Why a signed request was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum RejectReason {
    #[error("malformed-signature")]
    MalformedSignature,
    #[error("expired-signature")]
    ExpiredSignature,
    #[error("host-mismatch")]
    HostMismatch,
    #[error("missing-digest")]
    MissingDigest,
    #[error("malformed-digest")]
    MalformedDigest,
    #[error("unsupported-digest")]
    UnsupportedDigest,
    #[error("missing-body")]
    MissingBody,
    #[error("digest-mismatch")]
    DigestMismatch,
    #[error("blocked-host")]
    BlockedHost,
    #[error("unknown-signer")]
    UnknownSigner,
    #[error("bad-signature")]
    BadSignature,
}

impl RejectReason {
    /// Stable identifier used in audit logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedSignature => "malformed-signature",
            Self::ExpiredSignature => "expired-signature",
            Self::HostMismatch => "host-mismatch",
            Self::MissingDigest => "missing-digest",
            Self::MalformedDigest => "malformed-digest",
            Self::UnsupportedDigest => "unsupported-digest",
            Self::MissingBody => "missing-body",
            Self::DigestMismatch => "digest-mismatch",
            Self::BlockedHost => "blocked-host",
            Self::UnknownSigner => "unknown-signer",
            Self::BadSignature => "bad-signature",
        }
    }

    /// HTTP status reported to the requester.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::MissingBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the request was structurally invalid rather than untrusted.
    #[must_use]
    pub const fn is_malformed(self) -> bool {
        matches!(
            self,
            Self::MalformedSignature
                | Self::MissingDigest
                | Self::MalformedDigest
                | Self::UnsupportedDigest
                | Self::MissingBody
        )
    }
}

impl From<SignatureError> for RejectReason {
    fn from(err: SignatureError) -> Self {
        debug!(error = %err, "Rejecting malformed signature");
        Self::MalformedSignature
    }
}

/// Supported body digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
}

/// A validated `Digest` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyDigest {
    pub algorithm: DigestAlgorithm,
    /// Base64 digest as declared by the sender.
    pub value: String,
}

/// Local expectations a signature is checked against.
#[derive(Debug, Clone)]
pub struct SignaturePolicy {
    /// The `Host` value peers must sign.
    pub local_host: String,
    /// Maximum distance between a signed `Date` and now.
    pub max_age: TimeDelta,
}

impl SignaturePolicy {
    /// Create a policy for `local_host` with a clock skew allowance in seconds.
    #[must_use]
    pub fn new(local_host: impl Into<String>, max_age_secs: i64) -> Self {
        Self {
            local_host: local_host.into(),
            max_age: TimeDelta::seconds(max_age_secs),
        }
    }
}

/// The parsed, shape-validated signature of one request.
///
/// Holds everything needed to check the signature cryptographically later:
/// the signing string is rebuilt from the request as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureContext {
    pub key_id: String,
    pub algorithm: Option<String>,
    pub signed_headers: Vec<String>,
    pub signature: String,
    pub signing_string: String,
    pub digest: Option<BodyDigest>,
    #[serde(skip)]
    pub raw_body: Bytes,
}

impl SignatureContext {
    /// Parse and validate the signature of `request`.
    ///
    /// `body` is `None` for bodiless requests; for requests with a body the
    /// `digest` header must be signed and must match the exact bytes.
    pub fn parse(
        request: &ApRequest,
        body: Option<&Bytes>,
        policy: &SignaturePolicy,
    ) -> Result<Self, RejectReason> {
        let header = request
            .signature_header()
            .ok_or(RejectReason::MalformedSignature)?;
        let components = parse_signature_header(header)?;

        let host_signed = components.headers.iter().any(|h| h == "host");
        if !host_signed || request.header("host") != Some(policy.local_host.as_str()) {
            return Err(RejectReason::HostMismatch);
        }

        let digest = match body {
            Some(body) => Some(Self::check_digest(request, &components.headers, body)?),
            None => None,
        };

        if components.headers.iter().any(|h| h == "date") {
            let date = request
                .header("date")
                .ok_or(RejectReason::MalformedSignature)?;
            let signed_at = parse_http_date(date)?;
            if (Utc::now() - signed_at).abs() > policy.max_age {
                return Err(RejectReason::ExpiredSignature);
            }
        }

        let signing_string = build_signing_string(
            &components.headers,
            request.method.as_str(),
            request.path_and_query(),
            &request.headers,
        )?;

        Ok(Self {
            key_id: components.key_id,
            algorithm: components.algorithm,
            signed_headers: components.headers,
            signature: components.signature,
            signing_string,
            digest,
            raw_body: body.cloned().unwrap_or_default(),
        })
    }

    fn check_digest(
        request: &ApRequest,
        signed_headers: &[String],
        body: &Bytes,
    ) -> Result<BodyDigest, RejectReason> {
        if !signed_headers.iter().any(|h| h == "digest") {
            return Err(RejectReason::MissingDigest);
        }
        let header = request.header("digest").ok_or(RejectReason::MissingDigest)?;
        let (algorithm, value) =
            parse_digest_header(header).ok_or(RejectReason::MalformedDigest)?;
        if algorithm != "SHA-256" {
            return Err(RejectReason::UnsupportedDigest);
        }
        if body.is_empty() {
            return Err(RejectReason::MissingBody);
        }
        if sha256_base64(body) != value {
            return Err(RejectReason::DigestMismatch);
        }

        Ok(BodyDigest {
            algorithm: DigestAlgorithm::Sha256,
            value,
        })
    }

    /// Host part of the `keyId`, normalized.
    #[must_use]
    pub fn key_host(&self) -> Option<String> {
        apserve_common::host_of(&self.key_id)
    }

    /// The `keyId` without its fragment, which names the signing actor.
    #[must_use]
    pub fn actor_uri(&self) -> &str {
        self.key_id
            .split_once('#')
            .map_or(self.key_id.as_str(), |(actor, _)| actor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::signature::{HttpSigner, calculate_digest};
    use crate::test_utils::TestKeys;
    use axum::http::{HeaderMap, HeaderValue, Method};
    use url::Url;

    const KEY_ID: &str = "https://remote.example/users/alice#main-key";

    fn policy() -> SignaturePolicy {
        SignaturePolicy::new("local.example", 300)
    }

    fn signed(method: Method, path: &str, body: Option<&[u8]>) -> ApRequest {
        let keys = TestKeys::shared();
        let signer = HttpSigner::new(&keys.private_pem, KEY_ID.to_string()).unwrap();
        let url = Url::parse(&format!("https://local.example{path}")).unwrap();
        let headers = signer.sign_request(method.as_str(), &url, body).unwrap();
        ApRequest::new(method, path.parse().unwrap(), headers)
    }

    #[test]
    fn test_parse_valid_post() {
        let body = Bytes::from_static(b"{\"type\":\"Follow\"}");
        let request = signed(Method::POST, "/inbox", Some(&body));

        let context = SignatureContext::parse(&request, Some(&body), &policy()).unwrap();
        assert_eq!(context.key_id, KEY_ID);
        assert_eq!(context.actor_uri(), "https://remote.example/users/alice");
        assert_eq!(context.key_host().as_deref(), Some("remote.example"));
        assert_eq!(
            context.digest.unwrap().algorithm,
            DigestAlgorithm::Sha256
        );
        assert!(context.signing_string.starts_with("(request-target): post /inbox"));
        assert_eq!(context.raw_body, body);
    }

    #[test]
    fn test_missing_signature_is_malformed() {
        let request = ApRequest::new(Method::GET, "/".parse().unwrap(), HeaderMap::new());
        assert_eq!(
            SignatureContext::parse(&request, None, &policy()),
            Err(RejectReason::MalformedSignature)
        );
    }

    #[test]
    fn test_host_mismatch() {
        let request = signed(Method::GET, "/users/1", None);
        let other = SignaturePolicy::new("other.example", 300);
        assert_eq!(
            SignatureContext::parse(&request, None, &other),
            Err(RejectReason::HostMismatch)
        );
    }

    #[test]
    fn test_digest_mismatch() {
        let body = Bytes::from_static(b"{\"type\":\"Follow\"}");
        let request = signed(Method::POST, "/inbox", Some(&body));
        let tampered = Bytes::from_static(b"{\"type\":\"Delete\"}");
        assert_eq!(
            SignatureContext::parse(&request, Some(&tampered), &policy()),
            Err(RejectReason::DigestMismatch)
        );
    }

    #[test]
    fn test_unsupported_digest_algorithm() {
        let body = Bytes::from_static(b"{}");
        let mut request = signed(Method::POST, "/inbox", Some(&body));
        request
            .headers
            .insert("digest", HeaderValue::from_static("SHA-512=abcd"));
        assert_eq!(
            SignatureContext::parse(&request, Some(&body), &policy()),
            Err(RejectReason::UnsupportedDigest)
        );
    }

    #[test]
    fn test_malformed_digest() {
        let body = Bytes::from_static(b"{}");
        let mut request = signed(Method::POST, "/inbox", Some(&body));
        request
            .headers
            .insert("digest", HeaderValue::from_static("SHA 256"));
        assert_eq!(
            SignatureContext::parse(&request, Some(&body), &policy()),
            Err(RejectReason::MalformedDigest)
        );
    }

    #[test]
    fn test_empty_body_is_bad_request() {
        let mut request = signed(Method::POST, "/inbox", Some(b"{}"));
        let digest = calculate_digest(b"");
        request
            .headers
            .insert("digest", HeaderValue::from_str(&digest).unwrap());
        let err = SignatureContext::parse(&request, Some(&Bytes::new()), &policy()).unwrap_err();
        assert_eq!(err, RejectReason::MissingBody);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unsigned_digest_rejected_for_body() {
        let body = Bytes::from_static(b"{}");
        // Signed without a body, so `digest` is not among the signed headers.
        let mut request = signed(Method::POST, "/inbox", None);
        request
            .headers
            .insert("digest", HeaderValue::from_str(&calculate_digest(&body)).unwrap());
        assert_eq!(
            SignatureContext::parse(&request, Some(&body), &policy()),
            Err(RejectReason::MissingDigest)
        );
    }

    #[test]
    fn test_stale_date_is_expired() {
        let mut request = signed(Method::GET, "/users/1", None);
        request.headers.insert(
            "date",
            HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"),
        );
        assert_eq!(
            SignatureContext::parse(&request, None, &policy()),
            Err(RejectReason::ExpiredSignature)
        );
    }

    #[test]
    fn test_reason_strings_and_status() {
        assert_eq!(RejectReason::BlockedHost.as_str(), "blocked-host");
        assert_eq!(RejectReason::BadSignature.to_string(), "bad-signature");
        assert_eq!(RejectReason::UnknownSigner.status(), StatusCode::UNAUTHORIZED);
        assert!(RejectReason::MalformedDigest.is_malformed());
        assert!(!RejectReason::BlockedHost.is_malformed());
    }
}
