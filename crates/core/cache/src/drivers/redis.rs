use std::time::Duration;

use redis_kiss::AsyncCommands;
use stampede_result::{Result, ToStampedeError};

use super::AbstractCache;

/// Redis implementation
#[derive(Clone, Copy, Debug, Default)]
pub struct RedisCache;

#[async_trait]
impl AbstractCache for RedisCache {
    /// Read the raw entry stored for `key`
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = redis_kiss::get_connection()
            .await
            .map_err(|_| "redis connection error")
            .to_internal_error()?;

        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|_| create_database_error!("get", key))
    }

    /// Write a raw entry for `key` with an optional time-to-live
    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = redis_kiss::get_connection()
            .await
            .map_err(|_| "redis connection error")
            .to_internal_error()?;

        match ttl {
            Some(ttl) => {
                conn.pset_ex::<_, _, ()>(key, value, ttl.as_millis() as usize)
                    .await
            }
            None => conn.set::<_, _, ()>(key, value).await,
        }
        .map_err(|_| create_database_error!("set", key))
    }

    /// Delete the entry stored for `key`, if any
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = redis_kiss::get_connection()
            .await
            .map_err(|_| "redis connection error")
            .to_internal_error()?;

        conn.del::<_, ()>(key)
            .await
            .map_err(|_| create_database_error!("del", key))
    }
}
