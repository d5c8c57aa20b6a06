//! `ActivityPub` endpoint layer for apserve.
//!
//! Serves the receive side of federation:
//!
//! - **Signatures**: draft-cavage HTTP signature parsing and verification, with
//!   a key cache and a single refetch on failure
//! - **Access gate**: optional signature checks on `GET` with cache policy
//! - **Collections**: keyset-paginated followers, following and outbox
//! - **Negotiation**: `Accept`-based choice between HTML and `ActivityPub`
//! - **Inbox**: signature-shape validation and enqueue
//! - **Exposure**: which local users and notes may be served

pub mod activity;
pub mod client;
pub mod context;
pub mod convert;
pub mod exposure;
pub mod gate;
pub mod handler;
pub mod intake;
pub mod key_cache;
pub mod local;
pub mod middleware;
pub mod negotiation;
pub mod objects;
pub mod pagination;
pub mod request;
pub mod resolver;
pub mod router;
pub mod signature;
pub mod store;
pub mod test_utils;
pub mod verifier;

pub use activity::{ActivityError, InboxActivity};
pub use client::{ApClient, ApClientError};
pub use context::{RejectReason, SignatureContext, SignaturePolicy};
pub use gate::{AccessDecision, AccessGate};
pub use handler::FederationState;
pub use intake::{InboxIntake, InboxJob, InboxQueue};
pub use key_cache::PublicKeyCache;
pub use local::{InstanceActor, LocalIdentity, UrlConfig};
pub use negotiation::{Representation, negotiate};
pub use pagination::{Cursor, Paginator};
pub use request::ApRequest;
pub use resolver::{ActorKeyResolver, AuthenticatedActor, KeyFetcher, StoreKeyResolver};
pub use router::{federation_router, not_acceptable_router};
pub use signature::{HttpSigner, SignatureError};
pub use store::{DbFederationStore, FederationStore};
pub use verifier::{SignatureVerifier, Verification};
