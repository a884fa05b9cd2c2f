use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::lock::Mutex;
use stampede_result::Result;

use super::AbstractCache;

/// Reference implementation
#[derive(Clone, Default)]
pub struct ReferenceCache {
    pub entries: Arc<Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>>,
}

#[async_trait]
impl AbstractCache for ReferenceCache {
    /// Read the raw entry stored for `key`
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;

        if let Some((_, Some(expiry))) = entries.get(key) {
            if *expiry <= Instant::now() {
                entries.remove(key);
            }
        }

        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    /// Write a raw entry for `key` with an optional time-to-live
    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.entries.lock().await.insert(
            key.to_string(),
            (value.to_vec(), ttl.map(|ttl| Instant::now() + ttl)),
        );

        Ok(())
    }

    /// Delete the entry stored for `key`, if any
    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
