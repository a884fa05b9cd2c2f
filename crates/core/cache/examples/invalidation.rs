//! Round-trips an invalidation through Redis pub/sub: the listener
//! evicts the cached entry, so the next read fetches fresh data.
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use stampede_cache::{invalidation, CacheInfo, ReadThrough};

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Product {
    id: u32,
    name: String,
}

#[tokio::main]
async fn main() {
    stampede_config::configure!(invalidation);

    let cache = CacheInfo::Auto.connect().await.expect("cache");
    let read_through: ReadThrough<Product> = ReadThrough::from_config(cache).await;

    tokio::spawn(invalidation::listen(read_through.clone()));

    // Warm the cache.
    let product = read_through
        .get("product:1", || async {
            Ok(Some(Product {
                id: 1,
                name: "Product 1".to_string(),
            }))
        })
        .await;
    info!("Warmed cache with {product:?}");

    // A writer somewhere announces that the record changed.
    invalidation::publish("product:1")
        .await
        .expect("publish invalidation");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let product = read_through
        .get("product:1", || async {
            info!("Refetching after invalidation");

            Ok(Some(Product {
                id: 1,
                name: "Product 1 (updated)".to_string(),
            }))
        })
        .await;
    info!("Read after invalidation: {product:?}");
}
