use std::{future::Future, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use stampede_coalesced::Coalescer;
use stampede_result::{Result, ToStampedeError};

use crate::Cache;

/// Read-through wrapper composing the cache with a request coalescer.
///
/// A hit never touches the coalescer; a miss shares one upstream fetch
/// between every concurrent caller and writes the value back for the
/// next cold caller.
#[derive(Clone)]
pub struct ReadThrough<T> {
    cache: Cache,
    coalescer: Coalescer<String, Result<Option<T>>>,
    entry_ttl: Option<Duration>,
}

impl<T: Clone + Serialize + DeserializeOwned + Send + Sync> ReadThrough<T> {
    pub fn new(cache: Cache, entry_ttl: Option<Duration>) -> Self {
        Self {
            cache,
            coalescer: Coalescer::new(),
            entry_ttl,
        }
    }

    /// Create a read-through with the entry TTL from configuration
    pub async fn from_config(cache: Cache) -> Self {
        let config = stampede_config::config().await;

        Self::new(
            cache,
            Some(Duration::from_millis(config.cache.entry_ttl_ms)),
        )
    }

    /// Fetch `key` from the cache, falling back to the coalesced `fetch`.
    ///
    /// `Ok(None)` means the upstream has no record: a valid outcome,
    /// distinct from a failed fetch, and deliberately not cached.
    pub async fn get<F, Fut>(&self, key: &str, fetch: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match self.cache.read(key).await {
            Ok(Some(raw)) => {
                // A corrupt entry has to fail loudly; reported as a miss
                // it would send every caller upstream against it forever.
                return serde_json::from_slice(&raw).map(Some).to_fetch_error();
            }
            Ok(None) => {}
            Err(error) => {
                warn!("Cache read for {key} failed, treating as a miss: {error:?}");
            }
        }

        let result = self
            .coalescer
            .execute(key.to_string(), || async move {
                let value = fetch().await?;

                if let Some(value) = &value {
                    self.write_back(key, value).await;
                }

                Ok(value)
            })
            .await
            .to_internal_error()?;

        (*result).clone()
    }

    /// Fetch a value that must exist, mapping a missing record to NotFound
    pub async fn get_existing<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        self.get(key, fetch)
            .await?
            .ok_or_else(|| create_error!(NotFound))
    }

    /// Evict `key` locally and detach any in-flight fetch for it
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.cache.delete(key).await?;
        self.coalescer.forget(&key.to_string()).await;

        Ok(())
    }

    async fn write_back(&self, key: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(raw) => {
                if let Err(error) = self.cache.write(key, &raw, self.entry_ttl).await {
                    warn!("Failed to write {key} back to the cache: {error:?}");
                }
            }
            Err(error) => warn!("Failed to serialise {key} for the cache: {error:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use stampede_result::ErrorType;
    use tokio::{sync::Barrier, time::sleep};

    use super::*;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
    struct Product {
        id: u32,
        name: String,
    }

    fn product() -> Product {
        Product {
            id: 1,
            name: "Product 1".to_string(),
        }
    }

    #[tokio::test]
    async fn stampede_shares_one_fetch() {
        let cache = Cache::Reference(Default::default());
        let read_through: ReadThrough<Product> =
            ReadThrough::new(cache.clone(), Some(Duration::from_secs(60)));
        let fetches = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(10));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let read_through = read_through.clone();
            let fetches = fetches.clone();
            let barrier = barrier.clone();

            handles.push(tokio::spawn(async move {
                barrier.wait().await;

                read_through
                    .get("product:1", || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(300)).await;
                        Ok(Some(product()))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some(product()));
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // The fetched value was written back for the next cold caller.
        assert!(cache.read("product:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn hit_skips_the_coalescer() {
        let read_through: ReadThrough<Product> =
            ReadThrough::new(Cache::Reference(Default::default()), None);

        read_through
            .get("product:1", || async { Ok(Some(product())) })
            .await
            .unwrap();

        let value = read_through
            .get("product:1", || async { panic!("cache hit must not fetch") })
            .await
            .unwrap();

        assert_eq!(value, Some(product()));
    }

    #[tokio::test]
    async fn missing_upstream_record_is_valid_and_uncached() {
        let read_through: ReadThrough<Product> =
            ReadThrough::new(Cache::Reference(Default::default()), None);
        let fetches = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let fetches = fetches.clone();
            let value = read_through
                .get("product:404", || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();

            assert_eq!(value, None);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_fetch_error_not_a_miss() {
        let cache = Cache::Reference(Default::default());
        cache.write("product:1", b"{not json", None).await.unwrap();

        let read_through: ReadThrough<Product> = ReadThrough::new(cache, None);

        let error = read_through
            .get("product:1", || async {
                panic!("corrupt entries must not refetch")
            })
            .await
            .unwrap_err();

        assert!(matches!(error.error_type, ErrorType::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_is_shared_and_never_cached() {
        let cache = Cache::Reference(Default::default());
        let read_through: ReadThrough<Product> = ReadThrough::new(cache.clone(), None);

        let error = read_through
            .get("product:1", || async {
                Err(create_error!(FetchFailed {
                    reason: "boom".to_string()
                }))
            })
            .await
            .unwrap_err();

        assert!(matches!(error.error_type, ErrorType::FetchFailed { .. }));
        assert!(cache.read("product:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_existing_maps_missing_to_not_found() {
        let read_through: ReadThrough<Product> =
            ReadThrough::new(Cache::Reference(Default::default()), None);

        let error = read_through
            .get_existing("product:404", || async { Ok(None) })
            .await
            .unwrap_err();

        assert!(matches!(error.error_type, ErrorType::NotFound));
    }

    #[tokio::test]
    async fn invalidate_evicts_and_refetches() {
        let read_through: ReadThrough<Product> =
            ReadThrough::new(Cache::Reference(Default::default()), None);
        let fetches = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let fetches = fetches.clone();
            read_through
                .get("product:1", || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(product()))
                })
                .await
                .unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        read_through.invalidate("product:1").await.unwrap();

        let refetches = fetches.clone();
        read_through
            .get("product:1", || async move {
                refetches.fetch_add(1, Ordering::SeqCst);
                Ok(Some(product()))
            })
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
