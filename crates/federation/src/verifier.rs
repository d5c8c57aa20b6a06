//! HTTP signature verification with a single refetch on failure.
//!
//! Verification of one request moves through [`VerifyState`]: a pending
//! attempt with the known key, at most one pending attempt with a refetched
//! key, then a verified or rejected outcome.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use apserve_common::HostPolicy;

use crate::context::{RejectReason, SignatureContext, SignaturePolicy};
use crate::local::LocalIdentity;
use crate::request::ApRequest;
use crate::resolver::{ActorKeyResolver, AuthenticatedActor};
use crate::signature::verify_signature;

/// Outcome of verifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified(AuthenticatedActor),
    Rejected(RejectReason),
}

/// A verification attempt waiting to be checked.
#[derive(Debug)]
enum Attempt {
    /// Key from the cache or the store; may be refetched once.
    Known(AuthenticatedActor),
    /// Refetched or local key; a failure is terminal.
    Final(AuthenticatedActor),
}

#[derive(Debug)]
enum VerifyState {
    Pending(Attempt),
    Verified(AuthenticatedActor),
    Rejected(RejectReason),
}

/// Verifies signed requests against resolved actor keys.
#[derive(Clone)]
pub struct SignatureVerifier {
    resolver: Arc<dyn ActorKeyResolver>,
    hosts: HostPolicy,
    local: Arc<LocalIdentity>,
    policy: SignaturePolicy,
}

impl SignatureVerifier {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn ActorKeyResolver>,
        hosts: HostPolicy,
        local: Arc<LocalIdentity>,
        policy: SignaturePolicy,
    ) -> Self {
        Self {
            resolver,
            hosts,
            local,
            policy,
        }
    }

    /// Verify `request`, whose body (if it has one) is `body`.
    pub async fn verify(&self, request: &ApRequest, body: Option<&Bytes>) -> Verification {
        match SignatureContext::parse(request, body, &self.policy) {
            Ok(context) => self.verify_context(&context).await,
            Err(reason) => Verification::Rejected(reason),
        }
    }

    /// Verify an already parsed signature.
    pub async fn verify_context(&self, context: &SignatureContext) -> Verification {
        let Some(key_host) = context.key_host() else {
            return Verification::Rejected(RejectReason::MalformedSignature);
        };
        if self.hosts.is_blocked(&key_host) {
            return Verification::Rejected(RejectReason::BlockedHost);
        }

        let mut state = match self.resolve(context).await {
            Some(attempt) => VerifyState::Pending(attempt),
            None => VerifyState::Rejected(RejectReason::UnknownSigner),
        };

        loop {
            state = match state {
                VerifyState::Pending(attempt) => self.step(context, attempt).await,
                VerifyState::Verified(actor) => return Verification::Verified(actor),
                VerifyState::Rejected(reason) => return Verification::Rejected(reason),
            };
        }
    }

    async fn resolve(&self, context: &SignatureContext) -> Option<Attempt> {
        if self.local.is_instance_actor_key(&context.key_id) {
            return Some(Attempt::Final(AuthenticatedActor::instance_actor(
                &self.local,
            )));
        }

        let actor = match self.resolver.by_key_id(&context.key_id).await {
            Some(actor) => actor,
            None => self.resolver.by_actor_uri(context.actor_uri()).await?,
        };
        actor.public_key.is_some().then_some(Attempt::Known(actor))
    }

    async fn step(&self, context: &SignatureContext, attempt: Attempt) -> VerifyState {
        let (actor, may_refetch) = match attempt {
            Attempt::Known(actor) => (actor, true),
            Attempt::Final(actor) => (actor, false),
        };

        if signature_matches(context, &actor) {
            return VerifyState::Verified(actor);
        }
        if !may_refetch {
            return VerifyState::Rejected(RejectReason::BadSignature);
        }

        debug!(key_id = %context.key_id, actor = %actor.user.uri, "Signature failed, refetching key");
        match self.resolver.refetch_public_key(&actor).await {
            Some(key) => VerifyState::Pending(Attempt::Final(AuthenticatedActor {
                user: actor.user,
                public_key: Some(key),
            })),
            None => VerifyState::Rejected(RejectReason::BadSignature),
        }
    }
}

fn signature_matches(context: &SignatureContext, actor: &AuthenticatedActor) -> bool {
    let Some(ref key) = actor.public_key else {
        return false;
    };
    match verify_signature(&key.pem, &context.signing_string, &context.signature) {
        Ok(valid) => valid,
        Err(e) => {
            debug!(key_id = %key.id, error = %e, "Unusable public key");
            false
        }
    }
}
