//! Access gate for `GET` requests under signature checking.

use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use crate::context::RejectReason;
use crate::local::LocalIdentity;
use crate::request::ApRequest;
use crate::signature::parse_signature_header;
use crate::verifier::{SignatureVerifier, Verification};

/// Audit channel for signature decisions.
pub const SIGCHECK_TARGET: &str = "apserve::sigcheck";

/// Cache policy while `GET` signatures are checked.
pub const PRIVATE_NO_CACHE: &str = "private, max-age=0, must-revalidate";

/// Whether a request may proceed, and how its response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub refuse: bool,
    pub status: StatusCode,
    pub cache_control: Option<&'static str>,
}

impl AccessDecision {
    const fn allow(cache_control: Option<&'static str>) -> Self {
        Self {
            refuse: false,
            status: StatusCode::OK,
            cache_control,
        }
    }

    const fn refuse(status: StatusCode) -> Self {
        Self {
            refuse: true,
            status,
            cache_control: Some(PRIVATE_NO_CACHE),
        }
    }

    /// Set the decided `Cache-Control` on a response.
    pub fn apply(&self, response: &mut Response) {
        if let Some(value) = self.cache_control {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
        }
    }
}

impl IntoResponse for AccessDecision {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        self.apply(&mut response);
        response
    }
}

/// Decides whether inbound `GET` requests are served.
#[derive(Clone)]
pub struct AccessGate {
    check_signatures: bool,
    verifier: SignatureVerifier,
    local: Arc<LocalIdentity>,
}

impl AccessGate {
    #[must_use]
    pub fn new(check_signatures: bool, verifier: SignatureVerifier, local: Arc<LocalIdentity>) -> Self {
        Self {
            check_signatures,
            verifier,
            local,
        }
    }

    /// Whether `GET` signatures are checked at all.
    #[must_use]
    pub const fn is_checking(&self) -> bool {
        self.check_signatures
    }

    /// Decide on `request`, targeting the user named by `target_user` if any.
    pub async fn should_refuse(
        &self,
        request: &ApRequest,
        target_user: Option<&str>,
    ) -> AccessDecision {
        if !self.check_signatures {
            return AccessDecision::allow(None);
        }

        if target_user.is_some_and(|u| self.local.is_instance_actor(u)) {
            debug!(
                target: SIGCHECK_TARGET,
                request_id = %request.request_id,
                url = %request.uri,
                "Instance actor is always served"
            );
            return AccessDecision::allow(Some(PRIVATE_NO_CACHE));
        }

        match self.verifier.verify(request, None).await {
            Verification::Verified(actor) => {
                info!(
                    target: SIGCHECK_TARGET,
                    request_id = %request.request_id,
                    url = %request.uri,
                    actor = %actor.user.uri,
                    "Signature accepted"
                );
                AccessDecision::allow(Some(PRIVATE_NO_CACHE))
            }
            Verification::Rejected(reason) => {
                let key_id = request
                    .signature_header()
                    .and_then(|h| parse_signature_header(h).ok())
                    .map(|c| c.key_id);
                audit_rejection(request, key_id.as_deref(), reason);
                AccessDecision::refuse(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

/// Log a rejected signature on the audit channel.
pub fn audit_rejection(request: &ApRequest, key_id: Option<&str>, reason: RejectReason) {
    let key_id = key_id.unwrap_or_default();
    if reason.is_malformed() {
        debug!(
            target: SIGCHECK_TARGET,
            request_id = %request.request_id,
            url = %request.uri,
            key_id = %key_id,
            reason = reason.as_str(),
            "Signature rejected"
        );
    } else {
        info!(
            target: SIGCHECK_TARGET,
            request_id = %request.request_id,
            url = %request.uri,
            key_id = %key_id,
            reason = reason.as_str(),
            "Signature rejected"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::SignaturePolicy;
    use crate::key_cache::PublicKeyCache;
    use crate::resolver::StoreKeyResolver;
    use crate::test_utils::{
        MemoryStore, StubFetcher, TestKeys, fetched_key, remote_user, signed_request,
        test_identity,
    };
    use apserve_common::{HostLists, HostPolicy};
    use axum::http::Method;
    use std::time::Duration;

    const ACTOR: &str = "https://remote.example/users/r1";
    const KEY_ID: &str = "https://remote.example/users/r1#main-key";

    fn gate(check: bool, blocked: &[&str]) -> (AccessGate, Arc<MemoryStore>, Arc<StubFetcher>) {
        let store = Arc::new(MemoryStore::default());
        let fetcher = Arc::new(StubFetcher::failing());
        let local = Arc::new(test_identity());
        let resolver = StoreKeyResolver::new(
            store.clone(),
            PublicKeyCache::new(Duration::from_secs(60)),
            fetcher.clone(),
        );
        let verifier = SignatureVerifier::new(
            Arc::new(resolver),
            HostPolicy::new(HostLists::new(blocked.iter().copied(), Vec::<String>::new())),
            local.clone(),
            SignaturePolicy::new("local.example", 300),
        );
        (AccessGate::new(check, verifier, local), store, fetcher)
    }

    fn unsigned(path: &str) -> ApRequest {
        ApRequest::new(Method::GET, path.parse().unwrap(), Default::default())
    }

    #[tokio::test]
    async fn test_disabled_allows_without_header() {
        let (gate, _, _) = gate(false, &[]);
        let decision = gate.should_refuse(&unsigned("/users/u1"), Some("u1")).await;
        assert!(!decision.refuse);
        assert_eq!(decision.cache_control, None);
    }

    #[tokio::test]
    async fn test_unsigned_is_refused_privately() {
        let (gate, _, _) = gate(true, &[]);
        let decision = gate.should_refuse(&unsigned("/users/u1"), Some("u1")).await;
        assert!(decision.refuse);
        assert_eq!(decision.status, StatusCode::UNAUTHORIZED);
        assert_eq!(decision.cache_control, Some(PRIVATE_NO_CACHE));
    }

    #[tokio::test]
    async fn test_instance_actor_target_is_exempt() {
        let (gate, _, _) = gate(true, &[]);
        for target in ["instanceactor", "instance.actor"] {
            let decision = gate.should_refuse(&unsigned("/users/x"), Some(target)).await;
            assert!(!decision.refuse);
            assert_eq!(decision.cache_control, Some(PRIVATE_NO_CACHE));
        }

        let decision = gate.should_refuse(&unsigned("/users/x"), Some("INSTANCE.ACTOR")).await;
        assert!(decision.refuse);
    }

    #[tokio::test]
    async fn test_signed_request_is_allowed() {
        let (gate, store, _) = gate(true, &[]);
        let keys = TestKeys::shared();
        store.add_user(remote_user("r1", "remote.example"));
        store.add_public_key("r1", KEY_ID, &keys.public_pem);

        let request = signed_request(keys, KEY_ID, Method::GET, "/users/u1", None);
        let decision = gate.should_refuse(&request, Some("u1")).await;

        assert!(!decision.refuse);
        assert_eq!(decision.cache_control, Some(PRIVATE_NO_CACHE));
    }

    #[tokio::test]
    async fn test_blocked_host_refused_without_fetch() {
        let (gate, _, fetcher) = gate(true, &["remote.example"]);
        fetcher.set(Some(fetched_key(ACTOR, TestKeys::shared())));

        let request = signed_request(TestKeys::shared(), KEY_ID, Method::GET, "/notes/n1", None);
        let decision = gate.should_refuse(&request, None).await;

        assert!(decision.refuse);
        assert_eq!(decision.status, StatusCode::UNAUTHORIZED);
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_refusal_response() {
        let response = AccessDecision::refuse(StatusCode::UNAUTHORIZED).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            PRIVATE_NO_CACHE
        );
    }
}
