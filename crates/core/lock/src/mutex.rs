use std::{future::Future, time::Duration};

use stampede_result::Result;
use ulid::Ulid;

use crate::Leases;

/// Mutual exclusion on a named resource across independent processes.
///
/// Ownership is a leased record in the shared store: the store is the
/// source of truth, local state only remembers the token needed for a
/// conditional release. A crashed holder blocks the name for at most one
/// lease duration.
pub struct Mutex {
    leases: Leases,
    name: String,
    ttl: Duration,
    owner: Option<String>,
}

impl Mutex {
    pub fn new(leases: Leases, name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            leases,
            name: name.into(),
            ttl,
            owner: None,
        }
    }

    /// Create a mutex with the lease duration from configuration
    pub async fn from_config(leases: Leases, name: impl Into<String>) -> Self {
        let config = stampede_config::config().await;

        Self::new(
            leases,
            name,
            Duration::from_millis(config.locks.lease_ttl_ms),
        )
    }

    /// Take the lease, failing fast when another holder exists.
    ///
    /// A fresh owner token is minted per attempt so a previous holder of
    /// the same name can never be confused with this one. Contention is a
    /// recoverable outcome; retry and backoff are the caller's policy.
    pub async fn lock(&mut self) -> Result<()> {
        let owner = Ulid::new().to_string();

        if self.leases.try_create(&self.name, &owner, self.ttl).await? {
            self.owner = Some(owner);
            Ok(())
        } else {
            Err(create_error!(LockContention {
                name: self.name.clone()
            }))
        }
    }

    /// Release the lease if this mutex still holds it.
    ///
    /// Returns `Ok(false)` when the recorded owner no longer matches —
    /// the lease expired and may have been re-acquired — in which case
    /// the current holder's lease is left untouched.
    pub async fn unlock(&mut self) -> Result<bool> {
        let Some(owner) = self.owner.take() else {
            return Ok(false);
        };

        self.leases.delete_if_owner(&self.name, &owner).await
    }
}

/// Run `func` inside the critical section for `name`, releasing the
/// lease on every exit path, including error returns.
///
/// A release that finds the lease already expired is reported through
/// [`stampede_config::capture_error`] — the critical section outlived
/// its lease and another process may have entered it — but the work's
/// own result is returned untouched.
pub async fn with_lock<T, F, Fut>(leases: Leases, name: &str, func: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut mutex = Mutex::from_config(leases, name).await;
    mutex.lock().await?;

    let result = func().await;

    match mutex.unlock().await {
        Ok(true) => {}
        Ok(false) => {
            let error = create_error!(LockOwnershipMismatch {
                name: name.to_string()
            });

            warn!("Critical section for {name} outlived its lease");
            stampede_config::capture_error(&error);
        }
        Err(error) => stampede_config::capture_error(&error),
    }

    result
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
    use crate::ReferenceLeases;

    static NAME: &str = "account:42";

    fn reference() -> Leases {
        Leases::Reference(ReferenceLeases::default())
    }

    #[tokio::test]
    async fn second_owner_is_rejected_until_release() {
        let leases = reference();
        let mut a = Mutex::new(leases.clone(), NAME, Duration::from_secs(10));
        let mut b = Mutex::new(leases, NAME, Duration::from_secs(10));

        a.lock().await.unwrap();

        let error = b.lock().await.unwrap_err();
        assert!(matches!(
            error.error_type,
            ErrorType::LockContention { name } if name == NAME
        ));

        assert!(a.unlock().await.unwrap());
        b.lock().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_attempts_elect_one_holder() {
        let leases = reference();
        let successes = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let leases = leases.clone();
            let successes = successes.clone();
            let barrier = barrier.clone();

            handles.push(tokio::spawn(async move {
                let mut mutex = Mutex::new(leases, NAME, Duration::from_secs(10));

                barrier.wait().await;
                if mutex.lock().await.is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lease_expiry_frees_a_crashed_holder() {
        let leases = reference();
        let mut a = Mutex::new(leases.clone(), NAME, Duration::from_millis(200));
        let mut b = Mutex::new(leases, NAME, Duration::from_secs(10));

        // A "crashes" while holding the lease.
        a.lock().await.unwrap();

        assert!(b.lock().await.is_err());

        sleep(Duration::from_millis(250)).await;
        b.lock().await.unwrap();
    }

    #[tokio::test]
    async fn stale_unlock_spares_the_new_holder() {
        let leases = reference();
        let mut a = Mutex::new(leases.clone(), NAME, Duration::from_millis(100));
        let mut b = Mutex::new(leases.clone(), NAME, Duration::from_secs(10));

        a.lock().await.unwrap();
        sleep(Duration::from_millis(150)).await;

        // The name was re-acquired after A's lease lapsed.
        b.lock().await.unwrap();

        assert!(!a.unlock().await.unwrap());

        // B still holds a valid lease.
        assert!(b.unlock().await.unwrap());
    }

    #[tokio::test]
    async fn unlock_without_a_lease_is_a_no_op() {
        let mut mutex = Mutex::new(reference(), NAME, Duration::from_secs(10));
        assert!(!mutex.unlock().await.unwrap());
    }

    #[tokio::test]
    async fn with_lock_releases_on_the_error_path() {
        let leases = reference();

        let result: Result<()> = with_lock(leases.clone(), NAME, || async {
            Err(create_error!(InternalError))
        })
        .await;
        assert!(result.is_err());

        // The lease did not leak.
        let mut mutex = Mutex::new(leases, NAME, Duration::from_secs(10));
        mutex.lock().await.unwrap();
    }

    #[tokio::test]
    async fn with_lock_returns_the_work_result() {
        let value = with_lock(reference(), NAME, || async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
    }
}
