use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{CacheError, CacheStore};

/// In-process cache used when no Redis URL is configured. Expired entries are
/// dropped lazily on read.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, (String, Instant)>,
    generations: DashMap<String, u64>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        // Holding the ref across remove_if would deadlock the shard.
        let value = match self.entries.get(key) {
            Some(entry) if entry.1 > now => return Ok(Some(entry.0.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn generation(&self, generation_key: &str) -> Result<u64, CacheError> {
        Ok(self.generations.get(generation_key).map_or(0, |g| *g))
    }

    async fn bump_generation(&self, generation_key: &str) -> Result<u64, CacheError> {
        let mut generation = self.generations.entry(generation_key.to_string()).or_insert(0);
        *generation += 1;
        Ok(*generation)
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        generation_key: &str,
        expected: u64,
    ) -> Result<bool, CacheError> {
        // The write guard on the counter blocks concurrent bumps until the entry is in.
        let generation = self.generations.entry(generation_key.to_string()).or_insert(0);
        if *generation != expected {
            return Ok(false);
        }
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_delete() {
        let store = MemoryCacheStore::new();
        store
            .set_with_ttl("containers:1", "[]", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("containers:1").await.unwrap().as_deref(), Some("[]"));
        store.delete("containers:1").await.unwrap();
        assert_eq!(store.get("containers:1").await.unwrap(), None);
        // Deleting a missing key is not an error.
        store.delete("containers:1").await.unwrap();
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = MemoryCacheStore::new();
        store
            .set_with_ttl("containers:1", "[]", Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("containers:1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_conditional_set_follows_generation() {
        let store = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.generation("containers:1:generation").await.unwrap(), 0);
        assert!(
            store
                .set_if_generation("containers:1", "[1]", ttl, "containers:1:generation", 0)
                .await
                .unwrap()
        );

        assert_eq!(store.bump_generation("containers:1:generation").await.unwrap(), 1);
        assert!(
            !store
                .set_if_generation("containers:1", "[2]", ttl, "containers:1:generation", 0)
                .await
                .unwrap()
        );
        assert_eq!(store.get("containers:1").await.unwrap().as_deref(), Some("[1]"));
    }
}
