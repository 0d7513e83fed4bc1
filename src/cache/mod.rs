//! Short-lived cache for per-server container listings.
//!
//! Entries live under `containers:<server_id>` for a fixed TTL and are evicted
//! explicitly after every mutation this process performs on that server.
//!
//! Each server also has a generation counter under
//! `containers:<server_id>:generation`. Eviction bumps it, and a listing is only
//! written back if the generation it was read under is still current, so a slow
//! read can never overwrite the eviction of a mutation that finished meanwhile.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::db::entities::container;

pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal string key/value store with expiry and per-key generation counters.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Current value of a generation counter; 0 if it was never bumped.
    async fn generation(&self, generation_key: &str) -> Result<u64, CacheError>;
    async fn bump_generation(&self, generation_key: &str) -> Result<u64, CacheError>;
    /// Writes `value` only while `generation_key` still equals `expected`.
    /// The check and the write are atomic. Returns whether the write happened.
    async fn set_if_generation(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        generation_key: &str,
        expected: u64,
    ) -> Result<bool, CacheError>;
}

pub fn listing_key(server_id: i32) -> String {
    format!("containers:{server_id}")
}

pub fn generation_key(server_id: i32) -> String {
    format!("containers:{server_id}:generation")
}

/// Typed view over a [`CacheStore`] for container listings. Backend failures
/// never reach the caller: reads degrade to a miss, writes are logged.
#[derive(Clone)]
pub struct ContainerListingCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ContainerListingCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, server_id: i32) -> Option<Vec<container::Model>> {
        let key = listing_key(server_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss.");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(listing) => {
                debug!(key = %key, "Cache hit.");
                Some(listing)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry.");
                None
            }
        }
    }

    /// Generation to hand back to [`put`](Self::put). `None` when the backend
    /// is unreachable, in which case the listing should not be cached.
    pub async fn generation(&self, server_id: i32) -> Option<u64> {
        let key = generation_key(server_id);
        match self.store.generation(&key).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cache generation.");
                None
            }
        }
    }

    /// Caches `listing` unless the server was invalidated after `generation`
    /// was read. Returns whether the entry was written.
    pub async fn put(&self, server_id: i32, generation: u64, listing: &[container::Model]) -> bool {
        let key = listing_key(server_id);
        let result = match serde_json::to_string(listing) {
            Ok(raw) => {
                self.store
                    .set_if_generation(&key, &raw, self.ttl, &generation_key(server_id), generation)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(true) => true,
            Ok(false) => {
                debug!(key = %key, generation, "Listing went stale while loading, not cached.");
                false
            }
            Err(e) => {
                error!(key = %key, error = %e, "Failed to populate cache.");
                false
            }
        }
    }

    /// Bumps the generation before deleting, so an in-flight `put` that read
    /// the old generation is refused.
    pub async fn invalidate(&self, server_id: i32) {
        let generation = generation_key(server_id);
        if let Err(e) = self.store.bump_generation(&generation).await {
            error!(key = %generation, error = %e, "Failed to bump cache generation.");
        }
        let key = listing_key(server_id);
        if let Err(e) = self.store.delete(&key).await {
            error!(key = %key, error = %e, "Failed to invalidate cache.");
        }
    }
}
