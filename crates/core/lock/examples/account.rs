//! Serialises concurrent balance updates on one account across
//! processes; contended workers retry with a small backoff.
use std::time::Duration;

use log::{info, warn};
use stampede_lock::{with_lock, LeasesInfo};

#[tokio::main]
async fn main() {
    stampede_config::configure!(account);

    let leases = LeasesInfo::Auto.connect().await.expect("lease store");

    let mut handles = Vec::new();
    for worker in 0..5 {
        let leases = leases.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let credited = with_lock(leases.clone(), "account:42", || async {
                    info!("Worker {worker} crediting account 42");
                    tokio::time::sleep(Duration::from_millis(100)).await;

                    Ok(())
                })
                .await;

                match credited {
                    Ok(()) => break,
                    Err(error) => {
                        warn!("Worker {worker} will retry: {error}");
                        tokio::time::sleep(Duration::from_millis(150)).await;
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.await.expect("worker panicked");
    }
}
