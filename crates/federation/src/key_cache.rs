//! In-memory cache of resolved signer keys.
//!
//! Shared by all requests; reads take a read lock, only key resolution and
//! refetches write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::resolver::AuthenticatedActor;

#[derive(Debug, Clone)]
struct CachedKey {
    actor: AuthenticatedActor,
    cached_at: Instant,
}

/// Signer cache keyed by `keyId`, with a fixed TTL per entry.
#[derive(Debug, Clone)]
pub struct PublicKeyCache {
    entries: Arc<RwLock<HashMap<String, CachedKey>>>,
    ttl: Duration,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
}

impl PublicKeyCache {
    /// Create an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Look up a signer by `keyId`, ignoring expired entries.
    pub async fn get(&self, key_id: &str) -> Option<AuthenticatedActor> {
        let entries = self.entries.read().await;
        let entry = entries.get(key_id)?;
        if entry.cached_at.elapsed() < self.ttl {
            debug!(key_id = %key_id, "Public key cache hit");
            Some(entry.actor.clone())
        } else {
            None
        }
    }

    /// Store a signer under `key_id`, replacing any previous entry.
    ///
    /// Expired entries are dropped while the write lock is held, so the map
    /// never holds more than the signers seen within one TTL.
    pub async fn insert(&self, key_id: &str, actor: AuthenticatedActor) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.cached_at.elapsed() < self.ttl);
        entries.insert(
            key_id.to_string(),
            CachedKey {
                actor,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `key_id`.
    pub async fn invalidate(&self, key_id: &str) {
        self.entries.write().await.remove(key_id);
    }

    /// Remove expired entries, returning how many were dropped.
    pub async fn prune_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.cached_at.elapsed() < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Pruned expired public key cache entries");
        }
        removed
    }

    /// Current entry counts.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            total_entries: entries.len(),
            valid_entries: entries
                .values()
                .filter(|e| e.cached_at.elapsed() < self.ttl)
                .count(),
        }
    }
}
