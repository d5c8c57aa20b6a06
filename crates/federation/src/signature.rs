//! HTTP Signature primitives for `ActivityPub`.
//!
//! Implements the parts of draft-cavage-http-signatures that federation peers
//! use: `Signature` header parsing, signing-string construction, RSA-SHA256
//! signing and verification, and body digests.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPublicKey,
    pkcs1v15::{SigningKey, VerifyingKey},
};
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer, Verifier};
use tracing::debug;
use url::Url;

/// Pseudo-header standing for the request method and path.
pub const REQUEST_TARGET: &str = "(request-target)";

/// HTTP Signature error.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Missing header: {0}")]
    MissingHeader(String),
    #[error("Invalid signature header")]
    InvalidSignatureHeader,
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid date header format: {0}")]
    InvalidDateFormat(String),
}

/// HTTP Signature signer for requests made on behalf of a local actor.
pub struct HttpSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl HttpSigner {
    /// Create a new HTTP signer from a PEM-encoded private key.
    pub fn new(private_key_pem: &str, key_id: String) -> Result<Self, SignatureError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SignatureError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self {
            private_key,
            key_id,
        })
    }

    /// The `keyId` placed in produced signatures.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request and return the `Host`, `Date`, `Digest` (with a body)
    /// and `Signature` headers.
    pub fn sign_request(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, SignatureError> {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(SignatureError::InvalidUrl("No host in URL".to_string())),
        };
        let query = url.query().map_or(String::new(), |q| format!("?{q}"));
        let request_target = format!("{} {}{query}", method.to_lowercase(), url.path());
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let digest = body.map(calculate_digest);

        let mut signed_headers = vec![REQUEST_TARGET, "host", "date"];
        if digest.is_some() {
            signed_headers.push("digest");
        }

        let signing_string = signed_headers
            .iter()
            .map(|name| {
                let value = match *name {
                    REQUEST_TARGET => request_target.as_str(),
                    "host" => host.as_str(),
                    "date" => date.as_str(),
                    _ => digest.as_deref().unwrap_or_default(),
                };
                format!("{name}: {value}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        debug!(signing_string = %signing_string, "Signing string");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature_bytes = signing_key
            .try_sign(signing_string.as_bytes())
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
        let signature = BASE64.encode(signature_bytes.to_bytes());

        let signature_header = format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            signed_headers.join(" "),
            signature
        );

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "host", &host)?;
        insert_header(&mut headers, "date", &date)?;
        if let Some(ref d) = digest {
            insert_header(&mut headers, "digest", d)?;
        }
        insert_header(&mut headers, "signature", &signature_header)?;

        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), SignatureError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| SignatureError::SigningFailed(format!("{name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Parsed signature header components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureComponents {
    pub key_id: String,
    pub algorithm: Option<String>,
    /// Signed header names, lowercased, in signing order.
    pub headers: Vec<String>,
    pub signature: String,
}

/// Split `key="value",key2=value2` parameters, honoring quotes.
fn split_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| *c == ',' || c.is_whitespace()) {
            chars.next();
        }
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => value.extend(chars.next()),
                    c => value.push(c),
                }
            }
            value
        } else {
            chars.by_ref().take_while(|c| *c != ',').collect::<String>()
        };

        params.push((key.trim().to_string(), value.trim().to_string()));
    }

    params
}

/// Parse a `Signature` header value (or the parameters of an
/// `Authorization: Signature ...` header).
pub fn parse_signature_header(header: &str) -> Result<SignatureComponents, SignatureError> {
    let header = header.trim();
    let header = header
        .get(..10)
        .filter(|prefix| prefix.eq_ignore_ascii_case("signature "))
        .map_or(header, |_| &header[10..]);

    let mut key_id = None;
    let mut algorithm = None;
    let mut headers_list = None;
    let mut signature = None;

    for (key, value) in split_params(header) {
        match key.as_str() {
            "keyId" => key_id = Some(value),
            "algorithm" => algorithm = Some(value.to_lowercase()),
            "headers" => headers_list = Some(value),
            "signature" => signature = Some(value),
            _ => {}
        }
    }

    if let Some(ref alg) = algorithm
        && alg != "rsa-sha256"
        && alg != "hs2019"
    {
        return Err(SignatureError::UnsupportedAlgorithm(alg.clone()));
    }

    let headers: Vec<String> = headers_list
        .as_deref()
        .unwrap_or("date")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let key_id = key_id.filter(|k| !k.is_empty());
    let signature = signature.filter(|s| !s.is_empty());
    if headers.is_empty() {
        return Err(SignatureError::InvalidSignatureHeader);
    }

    Ok(SignatureComponents {
        key_id: key_id.ok_or(SignatureError::InvalidSignatureHeader)?,
        algorithm,
        headers,
        signature: signature.ok_or(SignatureError::InvalidSignatureHeader)?,
    })
}

/// Build the string that was signed, from the request as received.
pub fn build_signing_string(
    signed_headers: &[String],
    method: &str,
    path_and_query: &str,
    headers: &HeaderMap,
) -> Result<String, SignatureError> {
    let mut lines = Vec::with_capacity(signed_headers.len());
    for name in signed_headers {
        let value = if name == REQUEST_TARGET {
            format!("{} {path_and_query}", method.to_lowercase())
        } else {
            let values = headers
                .get_all(name.as_str())
                .iter()
                .map(|v| v.to_str().map(str::trim))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| SignatureError::MissingHeader(name.clone()))?;
            if values.is_empty() {
                return Err(SignatureError::MissingHeader(name.clone()));
            }
            values.join(", ")
        };
        lines.push(format!("{name}: {value}"));
    }
    Ok(lines.join("\n"))
}

/// Parse a PEM public key in either SPKI or PKCS#1 form.
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, SignatureError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))
}

/// Verify a base64 RSASSA-PKCS1-v1_5/SHA-256 signature over `signing_string`.
///
/// Returns `Ok(false)` when the key is usable but the signature does not match.
pub fn verify_signature(
    public_key_pem: &str,
    signing_string: &str,
    signature_b64: &str,
) -> Result<bool, SignatureError> {
    let public_key = parse_public_key(public_key_pem)?;

    let Ok(signature_bytes) = BASE64.decode(signature_b64) else {
        return Ok(false);
    };
    let Ok(signature) = rsa::pkcs1v15::Signature::try_from(signature_bytes.as_slice()) else {
        return Ok(false);
    };

    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    Ok(verifying_key
        .verify(signing_string.as_bytes(), &signature)
        .is_ok())
}

/// Base64 SHA-256 of a body.
#[must_use]
pub fn sha256_base64(body: &[u8]) -> String {
    BASE64.encode(Sha256::digest(body))
}

/// `Digest` header value for a body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    format!("SHA-256={}", sha256_base64(body))
}

/// Split a `Digest` header into its uppercased algorithm and value.
///
/// The algorithm must match `[A-Za-z0-9-]+` and the value must be non-empty.
#[must_use]
pub fn parse_digest_header(value: &str) -> Option<(String, String)> {
    let (algorithm, digest) = value.split_once('=')?;
    let valid_algorithm = !algorithm.is_empty()
        && algorithm
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid_algorithm || digest.is_empty() {
        return None;
    }
    Some((algorithm.to_uppercase(), digest.to_string()))
}

/// Parse an HTTP `Date` header.
pub fn parse_http_date(date_str: &str) -> Result<DateTime<Utc>, SignatureError> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];

    for format in &formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(SignatureError::InvalidDateFormat(date_str.to_string()))
}
