//! Simulates a cache stampede: ten concurrent readers of one cold key
//! share a single slow upstream fetch.
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use stampede_cache::{CacheInfo, ReadThrough};

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Product {
    id: u32,
    name: String,
}

#[tokio::main]
async fn main() {
    stampede_config::configure!(stampede);

    let cache = CacheInfo::Auto.connect().await.expect("cache");
    let read_through: ReadThrough<Product> = ReadThrough::from_config(cache).await;

    let mut handles = Vec::new();
    for task in 0..10 {
        let read_through = read_through.clone();

        handles.push(tokio::spawn(async move {
            let product = read_through
                .get("product:1", || async {
                    info!("Task {task} elected to fetch upstream");
                    tokio::time::sleep(Duration::from_millis(300)).await;

                    Ok(Some(Product {
                        id: 1,
                        name: "Product 1".to_string(),
                    }))
                })
                .await;

            info!("Task {task} received {product:?}");
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked");
    }
}
