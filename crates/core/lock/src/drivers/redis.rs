use std::time::Duration;

use redis_kiss::redis::Script;
use stampede_result::{Result, ToStampedeError};

use super::AbstractLeases;

/// Deletes a lease only while the stored owner token still matches, as a
/// single server-side step.
static RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis implementation
#[derive(Clone, Copy, Debug, Default)]
pub struct RedisLeases;

#[async_trait]
impl AbstractLeases for RedisLeases {
    /// Create a lease for `name` if and only if no unexpired lease exists
    async fn try_create(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut conn = redis_kiss::get_connection()
            .await
            .map_err(|_| "redis connection error")
            .to_internal_error()?;

        // SET NX leaves an unexpired lease untouched; PX lets a crashed
        // holder's lease lapse on its own.
        let reply: Option<String> = redis_kiss::redis::cmd("SET")
            .arg(name)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut *conn)
            .await
            .map_err(|_| create_database_error!("set", name))?;

        Ok(reply.is_some())
    }

    /// Delete the lease for `name` if and only if `owner` still holds it
    async fn delete_if_owner(&self, name: &str, owner: &str) -> Result<bool> {
        let mut conn = redis_kiss::get_connection()
            .await
            .map_err(|_| "redis connection error")
            .to_internal_error()?;

        let deleted: i32 = Script::new(RELEASE_SCRIPT)
            .key(name)
            .arg(owner)
            .invoke_async(&mut *conn)
            .await
            .map_err(|_| create_database_error!("eval", name))?;

        Ok(deleted == 1)
    }
}
