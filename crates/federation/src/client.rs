//! `ActivityPub` HTTP client used to fetch remote actor keys.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::local::InstanceActor;
use crate::negotiation::{ACTIVITY_JSON, LD_JSON};
use crate::resolver::{FetchedKey, KeyFetcher};
use crate::signature::{HttpSigner, SignatureError};

/// Error type for AP client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Signing failed: {0}")]
    SigningError(#[from] SignatureError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Fetch failed: {status}")]
    FetchFailed { status: u16 },
    #[error("Actor document has no usable public key")]
    MissingPublicKey,
}

/// `ActivityPub` HTTP client.
#[derive(Clone)]
pub struct ApClient {
    client: Client,
    user_agent: String,
    signer: Option<std::sync::Arc<HttpSigner>>,
}

impl ApClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(instance_url: &str, timeout: Duration) -> Result<Self, ApClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;

        let user_agent = format!(
            "apserve/{} (+{instance_url})",
            env!("CARGO_PKG_VERSION")
        );

        Ok(Self {
            client,
            user_agent,
            signer: None,
        })
    }

    /// Sign fetches as the instance actor, for peers that require it.
    pub fn with_instance_actor(
        mut self,
        actor: &InstanceActor,
        key_id: String,
    ) -> Result<Self, ApClientError> {
        self.signer = Some(std::sync::Arc::new(HttpSigner::new(
            &actor.private_key_pem,
            key_id,
        )?));
        Ok(self)
    }

    /// Fetch a remote actor document.
    pub async fn fetch_actor(&self, actor_url: &str) -> Result<Value, ApClientError> {
        let url = Url::parse(actor_url).map_err(|e| ApClientError::InvalidUrl(e.to_string()))?;

        debug!(actor_url = %actor_url, signed = self.signer.is_some(), "Fetching remote actor");

        let mut request = self
            .client
            .get(url.as_str())
            .header("User-Agent", &self.user_agent)
            .header("Accept", format!("{ACTIVITY_JSON}, {LD_JSON}"));
        if let Some(ref signer) = self.signer {
            request = request.headers(signer.sign_request("GET", &url, None)?);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApClientError::FetchFailed {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl KeyFetcher for ApClient {
    async fn fetch_key(&self, actor_uri: &str) -> Result<FetchedKey, ApClientError> {
        let actor = self.fetch_actor(actor_uri).await?;
        FetchedKey::from_actor_json(&actor).ok_or(ApClientError::MissingPublicKey)
    }
}

impl FetchedKey {
    /// Extract `publicKey` from an actor document.
    ///
    /// A `publicKey` given as an array uses its first entry.
    #[must_use]
    pub fn from_actor_json(json: &Value) -> Option<Self> {
        let actor_id = json.get("id")?.as_str()?.to_string();
        let public_key = match json.get("publicKey")? {
            Value::Array(keys) => keys.first()?,
            key => key,
        };
        let key_id = public_key.get("id")?.as_str()?.to_string();
        let owner = public_key
            .get("owner")
            .and_then(Value::as_str)
            .unwrap_or(&actor_id)
            .to_string();
        let pem = public_key.get("publicKeyPem")?.as_str()?.to_string();

        Some(Self {
            actor_id,
            key_id,
            owner,
            pem,
        })
    }
}
