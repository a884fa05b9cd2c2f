mod redis;
mod reference;

pub use self::redis::*;
pub use self::reference::*;

use std::time::Duration;

use stampede_config::config;
use stampede_result::Result;

/// Lease store information to use to create a client
pub enum LeasesInfo {
    /// Auto-detect the lease store in use
    Auto,
    /// Use the in-memory reference store
    Reference,
    /// Connect to Redis through the shared connection
    Redis,
}

/// Lease store
#[derive(Clone)]
pub enum Leases {
    /// Mock lease store
    Reference(ReferenceLeases),
    /// Redis lease store
    Redis(RedisLeases),
}

impl LeasesInfo {
    /// Create a lease store client from the given information
    #[async_recursion]
    pub async fn connect(self) -> Result<Leases, String> {
        let config = config().await;

        match self {
            LeasesInfo::Auto => {
                if config.database.redis.is_empty() {
                    LeasesInfo::Reference.connect().await
                } else {
                    LeasesInfo::Redis.connect().await
                }
            }
            LeasesInfo::Reference => Ok(Leases::Reference(Default::default())),
            LeasesInfo::Redis => {
                // The shared connection resolves its target from the
                // environment, which the configuration seeds.
                if std::env::var("REDIS_URI").is_err() {
                    std::env::set_var("REDIS_URI", &config.database.redis);
                }

                Ok(Leases::Redis(RedisLeases))
            }
        }
    }
}

#[async_trait]
pub trait AbstractLeases: Sync + Send {
    /// Create a lease for `name` if and only if no unexpired lease exists.
    ///
    /// Returns whether the lease was taken; `false` means another owner
    /// holds an unexpired lease.
    async fn try_create(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Delete the lease for `name` if and only if `owner` still holds it.
    ///
    /// Returns whether a lease was deleted; `false` means the lease
    /// expired, was released, or belongs to someone else by now.
    async fn delete_if_owner(&self, name: &str, owner: &str) -> Result<bool>;
}

impl std::ops::Deref for Leases {
    type Target = dyn AbstractLeases;

    fn deref(&self) -> &Self::Target {
        match &self {
            Leases::Reference(reference) => reference,
            Leases::Redis(redis) => redis,
        }
    }
}
