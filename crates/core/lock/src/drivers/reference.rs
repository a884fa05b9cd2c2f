use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::lock::Mutex;
use stampede_result::Result;

use super::AbstractLeases;

/// Reference implementation
#[derive(Clone, Default)]
pub struct ReferenceLeases {
    pub leases: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

#[async_trait]
impl AbstractLeases for ReferenceLeases {
    /// Create a lease for `name` if and only if no unexpired lease exists
    async fn try_create(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().await;

        if let Some((_, expiry)) = leases.get(name) {
            if *expiry > Instant::now() {
                return Ok(false);
            }
        }

        leases.insert(name.to_string(), (owner.to_string(), Instant::now() + ttl));

        Ok(true)
    }

    /// Delete the lease for `name` if and only if `owner` still holds it
    async fn delete_if_owner(&self, name: &str, owner: &str) -> Result<bool> {
        let mut leases = self.leases.lock().await;

        match leases.get(name) {
            Some((holder, expiry)) if holder == owner && *expiry > Instant::now() => {
                leases.remove(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
