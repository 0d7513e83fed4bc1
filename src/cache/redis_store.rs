use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::info;

use super::{CacheError, CacheStore};

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// KEYS[1] entry, KEYS[2] generation counter; ARGV expected generation, value, ttl secs.
const SET_IF_GENERATION: &str = r#"
local current = redis.call('GET', KEYS[2]) or '0'
if current ~= ARGV[1] then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

/// Redis-backed cache. The multiplexed connection is cheap to clone and
/// reconnect attempts are left to the client.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: MultiplexedConnection,
    set_if_generation: Script,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis cache.");
        Ok(Self {
            conn,
            set_if_generation: Script::new(SET_IF_GENERATION),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn generation(&self, generation_key: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(generation_key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn bump_generation(&self, generation_key: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let value: u64 = conn.incr(generation_key, 1u64).await?;
        Ok(value)
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        generation_key: &str,
        expected: u64,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let written: i32 = self
            .set_if_generation
            .key(key)
            .key(generation_key)
            .arg(expected)
            .arg(value)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(written == 1)
    }
}
