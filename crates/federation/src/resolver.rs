//! Resolution of signing actors and their public keys.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use apserve_common::host_of;
use apserve_db::entities::{user, user_publickey};

use crate::client::ApClientError;
use crate::key_cache::PublicKeyCache;
use crate::local::LocalIdentity;
use crate::store::FederationStore;

/// The actor a signature claims to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerRef {
    /// Local database id, when the actor is known.
    pub user_id: Option<String>,
    pub uri: String,
    /// `None` for this instance's own actors.
    pub host: Option<String>,
}

/// A public key published by an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorPublicKey {
    pub id: String,
    pub pem: String,
    pub owner_user_id: Option<String>,
}

/// An actor resolved for a request, with the key to verify it against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedActor {
    pub user: SignerRef,
    pub public_key: Option<ActorPublicKey>,
}

impl AuthenticatedActor {
    /// The instance actor, with its key from the local keypair.
    #[must_use]
    pub fn instance_actor(local: &LocalIdentity) -> Self {
        let actor = &local.instance_actor;
        Self {
            user: SignerRef {
                user_id: Some(actor.id.clone()),
                uri: local.urls.user_url(&actor.id),
                host: None,
            },
            public_key: Some(ActorPublicKey {
                id: local.urls.key_id(&actor.id),
                pem: actor.public_key_pem.clone(),
                owner_user_id: Some(actor.id.clone()),
            }),
        }
    }

    fn from_user(user: &user::Model, key: Option<user_publickey::Model>) -> Option<Self> {
        let uri = user.uri.clone()?;
        Some(Self {
            user: SignerRef {
                user_id: Some(user.id.clone()),
                uri,
                host: user.host.clone(),
            },
            public_key: key.map(|k| ActorPublicKey {
                id: k.key_id,
                pem: k.key_pem,
                owner_user_id: Some(k.user_id),
            }),
        })
    }

    /// Whether the signer is one of this instance's actors.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.user.host.is_none()
    }
}

/// The `publicKey` of a freshly fetched actor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedKey {
    pub actor_id: String,
    pub key_id: String,
    pub owner: String,
    pub pem: String,
}

impl FetchedKey {
    /// Whether this key may stand for the actor at `actor_uri`.
    ///
    /// The document must describe that actor, the key must claim it as owner,
    /// and the key id must live on the same host.
    #[must_use]
    pub fn belongs_to(&self, actor_uri: &str) -> bool {
        let actor_host = host_of(actor_uri);
        self.actor_id == actor_uri
            && self.owner == actor_uri
            && actor_host.is_some()
            && host_of(&self.key_id) == actor_host
    }
}

/// Network access to actor documents.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Fetch the current public key of the actor at `actor_uri`.
    async fn fetch_key(&self, actor_uri: &str) -> Result<FetchedKey, ApClientError>;
}

/// Lookup of signers, injected into the signature verifier.
#[async_trait]
pub trait ActorKeyResolver: Send + Sync {
    /// Resolve by exact `keyId`, using cached or stored keys only.
    async fn by_key_id(&self, key_id: &str) -> Option<AuthenticatedActor>;

    /// Resolve by actor URI (the `keyId` without fragment).
    async fn by_actor_uri(&self, uri: &str) -> Option<AuthenticatedActor>;

    /// Fetch the actor's current key from its origin, replacing cached copies.
    ///
    /// Any failure yields `None`.
    async fn refetch_public_key(&self, actor: &AuthenticatedActor) -> Option<ActorPublicKey>;
}

/// Resolver over the key cache, the database and remote actor documents.
pub struct StoreKeyResolver {
    store: Arc<dyn FederationStore>,
    cache: PublicKeyCache,
    fetcher: Arc<dyn KeyFetcher>,
}

impl StoreKeyResolver {
    #[must_use]
    pub fn new(
        store: Arc<dyn FederationStore>,
        cache: PublicKeyCache,
        fetcher: Arc<dyn KeyFetcher>,
    ) -> Self {
        Self {
            store,
            cache,
            fetcher,
        }
    }

    async fn cache_actor(&self, actor: &AuthenticatedActor) {
        if let Some(ref key) = actor.public_key {
            self.cache.insert(&key.id, actor.clone()).await;
        }
    }

    async fn fetch_unknown(&self, uri: &str) -> Option<AuthenticatedActor> {
        let fetched = match self.fetcher.fetch_key(uri).await {
            Ok(fetched) => fetched,
            Err(e) => {
                debug!(actor = %uri, error = %e, "Failed to fetch unknown signer");
                return None;
            }
        };
        if !fetched.belongs_to(uri) {
            info!(actor = %uri, key_id = %fetched.key_id, "Fetched key does not belong to actor");
            return None;
        }

        let actor = AuthenticatedActor {
            user: SignerRef {
                user_id: None,
                uri: uri.to_string(),
                host: host_of(uri),
            },
            public_key: Some(ActorPublicKey {
                id: fetched.key_id,
                pem: fetched.pem,
                owner_user_id: None,
            }),
        };
        self.cache_actor(&actor).await;
        Some(actor)
    }
}

#[async_trait]
impl ActorKeyResolver for StoreKeyResolver {
    async fn by_key_id(&self, key_id: &str) -> Option<AuthenticatedActor> {
        if let Some(actor) = self.cache.get(key_id).await {
            return Some(actor);
        }

        let key = match self.store.find_public_key_by_key_id(key_id).await {
            Ok(key) => key?,
            Err(e) => {
                error!(key_id = %key_id, error = %e, "Public key lookup failed");
                return None;
            }
        };
        let user = match self.store.find_user(&key.user_id).await {
            Ok(user) => user?,
            Err(e) => {
                error!(key_id = %key_id, error = %e, "Key owner lookup failed");
                return None;
            }
        };

        let actor = AuthenticatedActor::from_user(&user, Some(key))?;
        self.cache_actor(&actor).await;
        Some(actor)
    }

    async fn by_actor_uri(&self, uri: &str) -> Option<AuthenticatedActor> {
        let user = match self.store.find_remote_user_by_uri(uri).await {
            Ok(user) => user,
            Err(e) => {
                error!(actor = %uri, error = %e, "Actor lookup failed");
                return None;
            }
        };

        let Some(user) = user else {
            return self.fetch_unknown(uri).await;
        };

        let key = match self.store.find_public_key_by_user(&user.id).await {
            Ok(key) => key,
            Err(e) => {
                error!(actor = %uri, error = %e, "Public key lookup failed");
                return None;
            }
        };
        let actor = AuthenticatedActor::from_user(&user, key)?;
        self.cache_actor(&actor).await;
        Some(actor)
    }

    async fn refetch_public_key(&self, actor: &AuthenticatedActor) -> Option<ActorPublicKey> {
        if actor.is_local() {
            return None;
        }
        let uri = &actor.user.uri;

        let fetched = match self.fetcher.fetch_key(uri).await {
            Ok(fetched) => fetched,
            Err(e) => {
                debug!(actor = %uri, error = %e, "Public key refetch failed");
                return None;
            }
        };
        if !fetched.belongs_to(uri) {
            info!(actor = %uri, key_id = %fetched.key_id, "Refetched key does not belong to actor");
            return None;
        }

        let key = ActorPublicKey {
            id: fetched.key_id,
            pem: fetched.pem,
            owner_user_id: actor.user.user_id.clone(),
        };

        if let Some(ref user_id) = actor.user.user_id {
            let stored = user_publickey::Model {
                user_id: user_id.clone(),
                key_id: key.id.clone(),
                key_pem: key.pem.clone(),
            };
            if let Err(e) = self.store.save_public_key(stored).await {
                error!(actor = %uri, error = %e, "Failed to persist refetched key");
            }
        }

        if let Some(ref old) = actor.public_key
            && old.id != key.id
        {
            self.cache.invalidate(&old.id).await;
        }
        self.cache_actor(&AuthenticatedActor {
            user: actor.user.clone(),
            public_key: Some(key.clone()),
        })
        .await;

        info!(actor = %uri, key_id = %key.id, "Refetched public key");
        Some(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryStore, StubFetcher, remote_user};
    use std::time::Duration;

    const ACTOR: &str = "https://remote.example/users/r1";
    const KEY_ID: &str = "https://remote.example/users/r1#main-key";

    fn fetched(pem: &str) -> FetchedKey {
        FetchedKey {
            actor_id: ACTOR.to_string(),
            key_id: KEY_ID.to_string(),
            owner: ACTOR.to_string(),
            pem: pem.to_string(),
        }
    }

    fn resolver(store: &Arc<MemoryStore>, fetcher: &Arc<StubFetcher>) -> StoreKeyResolver {
        StoreKeyResolver::new(
            store.clone(),
            PublicKeyCache::new(Duration::from_secs(60)),
            fetcher.clone(),
        )
    }

    #[test]
    fn test_fetched_key_ownership() {
        assert!(fetched("pem").belongs_to(ACTOR));
        let mut foreign = fetched("pem");
        foreign.key_id = "https://evil.example/keys/1".to_string();
        assert!(!foreign.belongs_to(ACTOR));
        let mut other_owner = fetched("pem");
        other_owner.owner = "https://remote.example/users/r2".to_string();
        assert!(!other_owner.belongs_to(ACTOR));
    }

    #[tokio::test]
    async fn test_by_key_id_from_store_then_cache() {
        let store = Arc::new(MemoryStore::default());
        store.add_user(remote_user("r1", "remote.example"));
        store.add_public_key("r1", KEY_ID, "stored-pem");
        let fetcher = Arc::new(StubFetcher::default());
        let resolver = resolver(&store, &fetcher);

        let actor = resolver.by_key_id(KEY_ID).await.unwrap();
        assert_eq!(actor.user.uri, ACTOR);
        assert_eq!(actor.public_key.unwrap().pem, "stored-pem");

        store.clear_public_keys();
        assert!(resolver.by_key_id(KEY_ID).await.is_some());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_actor_is_fetched_once_and_cached() {
        let store = Arc::new(MemoryStore::default());
        let fetcher = Arc::new(StubFetcher::returning(fetched("fresh-pem")));
        let resolver = resolver(&store, &fetcher);

        assert!(resolver.by_key_id(KEY_ID).await.is_none());
        let actor = resolver.by_actor_uri(ACTOR).await.unwrap();
        assert!(actor.user.user_id.is_none());
        assert_eq!(actor.user.host.as_deref(), Some("remote.example"));
        assert_eq!(fetcher.calls(), 1);

        assert!(resolver.by_key_id(KEY_ID).await.is_some());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refetch_persists_and_updates_cache() {
        let store = Arc::new(MemoryStore::default());
        store.add_user(remote_user("r1", "remote.example"));
        store.add_public_key("r1", KEY_ID, "old-pem");
        let fetcher = Arc::new(StubFetcher::returning(fetched("new-pem")));
        let resolver = resolver(&store, &fetcher);

        let actor = resolver.by_key_id(KEY_ID).await.unwrap();
        let key = resolver.refetch_public_key(&actor).await.unwrap();
        assert_eq!(key.pem, "new-pem");
        assert_eq!(store.public_key_pem("r1").as_deref(), Some("new-pem"));

        let cached = resolver.by_key_id(KEY_ID).await.unwrap();
        assert_eq!(cached.public_key.unwrap().pem, "new-pem");
    }

    #[tokio::test]
    async fn test_refetch_failure_is_none() {
        let store = Arc::new(MemoryStore::default());
        store.add_user(remote_user("r1", "remote.example"));
        store.add_public_key("r1", KEY_ID, "old-pem");
        let fetcher = Arc::new(StubFetcher::failing());
        let resolver = resolver(&store, &fetcher);

        let actor = resolver.by_key_id(KEY_ID).await.unwrap();
        assert!(resolver.refetch_public_key(&actor).await.is_none());
        assert_eq!(store.public_key_pem("r1").as_deref(), Some("old-pem"));
    }
}
