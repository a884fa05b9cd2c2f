//! Cache invalidation fan-out over Redis pub/sub.
//!
//! Writers publish the key they touched; every process's listener evicts
//! its cached entry and detaches any in-flight fetch, so no replica
//! serves stale data for longer than one pub/sub round-trip.

use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::RedisConfig;
use serde::{de::DeserializeOwned, Serialize};
use stampede_result::{Result, ToStampedeError};

use crate::ReadThrough;

/// Notification published when an entry changes upstream
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub key: String,
}

/// Publish an invalidation for the given key
pub async fn publish(key: &str) -> Result<()> {
    let config = stampede_config::config().await;

    redis_kiss::publish(
        config.cache.invalidation_channel,
        Invalidation {
            key: key.to_string(),
        },
    )
    .await
    .map_err(|_| "redis publish error")
    .to_internal_error()
}

/// Apply invalidations to the given read-through until the subscriber
/// connection dies.
pub async fn listen<T: Clone + Serialize + DeserializeOwned + Send + Sync>(
    read_through: ReadThrough<T>,
) -> Result<()> {
    let config = stampede_config::config().await;

    let subscriber = fred::prelude::Builder::from_config(
        RedisConfig::from_url(&config.database.redis).to_internal_error()?,
    )
    .build_subscriber_client()
    .to_internal_error()?;

    subscriber.init().await.to_internal_error()?;
    subscriber
        .subscribe(config.cache.invalidation_channel)
        .await
        .to_internal_error()?;

    let mut message_rx = subscriber.message_rx();
    loop {
        let message = message_rx.recv().await.to_internal_error()?;

        let Some(payload) = message.value.as_str() else {
            warn!("Ignoring non-string invalidation payload");
            continue;
        };

        match serde_json::from_str::<Invalidation>(&payload) {
            Ok(invalidation) => {
                info!("Invalidating {}", invalidation.key);

                if let Err(error) = read_through.invalidate(&invalidation.key).await {
                    stampede_config::capture_error(&error);
                }
            }
            Err(error) => {
                warn!("Failed to parse invalidation payload: {error:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::invalidation::Invalidation;

    #[test]
    fn payload_shape_is_stable() {
        // Older listeners parse whatever newer writers publish; the wire
        // shape is part of the contract.
        let raw = serde_json::to_string(&Invalidation {
            key: "product:1".to_string(),
        })
        .unwrap();

        assert_eq!(raw, r#"{"key":"product:1"}"#);
    }
}
