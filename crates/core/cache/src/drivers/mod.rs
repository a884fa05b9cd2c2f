mod redis;
mod reference;

pub use self::redis::*;
pub use self::reference::*;

use std::time::Duration;

use stampede_config::config;
use stampede_result::Result;

/// Cache information to use to create a client
pub enum CacheInfo {
    /// Auto-detect the cache in use
    Auto,
    /// Use the in-memory reference cache
    Reference,
    /// Connect to Redis through the shared connection
    Redis,
}

/// Cache
#[derive(Clone)]
pub enum Cache {
    /// Mock cache
    Reference(ReferenceCache),
    /// Redis cache
    Redis(RedisCache),
}

impl CacheInfo {
    /// Create a cache client from the given cache information
    #[async_recursion]
    pub async fn connect(self) -> Result<Cache, String> {
        let config = config().await;

        match self {
            CacheInfo::Auto => {
                if config.database.redis.is_empty() {
                    CacheInfo::Reference.connect().await
                } else {
                    CacheInfo::Redis.connect().await
                }
            }
            CacheInfo::Reference => Ok(Cache::Reference(Default::default())),
            CacheInfo::Redis => {
                // The shared connection resolves its target from the
                // environment, which the configuration seeds.
                if std::env::var("REDIS_URI").is_err() {
                    std::env::set_var("REDIS_URI", &config.database.redis);
                }

                Ok(Cache::Redis(RedisCache))
            }
        }
    }
}

#[async_trait]
pub trait AbstractCache: Sync + Send {
    /// Read the raw entry stored for `key`
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a raw entry for `key` with an optional time-to-live
    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Delete the entry stored for `key`, if any
    async fn delete(&self, key: &str) -> Result<()>;
}

impl std::ops::Deref for Cache {
    type Target = dyn AbstractCache;

    fn deref(&self) -> &Self::Target {
        match &self {
            Cache::Reference(reference) => reference,
            Cache::Redis(redis) => redis,
        }
    }
}
