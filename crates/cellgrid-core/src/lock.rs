//! Distributed lock provider.
//!
//! Acquisition hands out an opaque uuid token; release is compare-and-delete
//! and extension is compare-and-set, both atomic relative to other holders.
//! Locks expire at their TTL, so holders must `extend` before it elapses to
//! stay correct.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

const LOCK_PREFIX: &str = "lock:";

/// Contract for distributed mutual exclusion on named resources.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to acquire the lock; returns the token if acquired.
    async fn acquire(&self, resource_key: &str, ttl: Duration) -> Option<String>;

    /// Release the lock if `token` still owns it. Stale tokens are a no-op
    /// and return false.
    async fn release(&self, resource_key: &str, token: &str) -> bool;

    /// Extend the TTL if `token` still owns the lock.
    async fn extend(&self, resource_key: &str, token: &str, additional_ttl: Duration) -> bool;

    /// Whether a valid (unexpired) lock currently exists for the resource.
    async fn is_locked(&self, resource_key: &str) -> bool;

    /// Poll `acquire` every `retry_interval` until `acquire_timeout` elapses.
    async fn acquire_with_retry(
        &self,
        resource_key: &str,
        ttl: Duration,
        acquire_timeout: Duration,
        retry_interval: Duration,
    ) -> Option<String> {
        let deadline = Instant::now() + acquire_timeout;
        loop {
            if let Some(token) = self.acquire(resource_key, ttl).await {
                return Some(token);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(retry_interval).await;
        }
    }
}

#[derive(Debug, Clone)]
struct LockEntry {
    token: String,
    expires_at: Instant,
}

impl LockEntry {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process lock table.
///
/// The dashmap entry API supplies the atomic check-and-act that the
/// distributed implementations script server-side; expired entries are
/// treated as absent and reaped on contact.
#[derive(Debug, Default)]
pub struct MemoryLock {
    locks: DashMap<String, LockEntry>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(resource_key: &str) -> String {
        format!("{LOCK_PREFIX}{resource_key}")
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn acquire(&self, resource_key: &str, ttl: Duration) -> Option<String> {
        let token = Uuid::new_v4().to_string();
        let entry = LockEntry {
            token: token.clone(),
            expires_at: Instant::now() + ttl,
        };
        match self.locks.entry(Self::key(resource_key)) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().expired() {
                    occupied.insert(entry);
                    info!(resource_key, "acquired lock over expired holder");
                    Some(token)
                } else {
                    debug!(resource_key, "lock already held");
                    None
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry);
                info!(resource_key, "acquired lock");
                Some(token)
            }
        }
    }

    async fn release(&self, resource_key: &str, token: &str) -> bool {
        let removed = self
            .locks
            .remove_if(&Self::key(resource_key), |_, entry| {
                entry.token == token && !entry.expired()
            })
            .is_some();
        if removed {
            info!(resource_key, "released lock");
        } else {
            warn!(resource_key, "cannot release lock: token mismatch or expired");
        }
        removed
    }

    async fn extend(&self, resource_key: &str, token: &str, additional_ttl: Duration) -> bool {
        match self.locks.entry(Self::key(resource_key)) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.token == token && !entry.expired() {
                    entry.expires_at += additional_ttl;
                    debug!(resource_key, ?additional_ttl, "extended lock");
                    true
                } else {
                    warn!(resource_key, "cannot extend lock: token mismatch or expired");
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(_) => false,
        }
    }

    async fn is_locked(&self, resource_key: &str) -> bool {
        self.locks
            .get(&Self::key(resource_key))
            .map(|entry| !entry.expired())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_fails_while_held() {
        let lock = MemoryLock::new();
        let token = lock.acquire("matrix_cell:1", Duration::from_secs(30)).await;
        assert!(token.is_some());
        assert!(lock.acquire("matrix_cell:1", Duration::from_secs(30)).await.is_none());
        assert!(lock.is_locked("matrix_cell:1").await);

        // A different resource is independent.
        assert!(lock.acquire("matrix_cell:2", Duration::from_secs(30)).await.is_some());
    }

    #[tokio::test]
    async fn test_release_requires_matching_token() {
        let lock = MemoryLock::new();
        let token = lock
            .acquire("matrix_cell:1", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(!lock.release("matrix_cell:1", "stale-token").await);
        assert!(lock.is_locked("matrix_cell:1").await);
        assert!(lock.release("matrix_cell:1", &token).await);
        assert!(!lock.is_locked("matrix_cell:1").await);
        // Double release is a no-op.
        assert!(!lock.release("matrix_cell:1", &token).await);
    }

    #[tokio::test]
    async fn test_ttl_expiry_frees_the_lock() {
        let lock = MemoryLock::new();
        let stale = lock
            .acquire("matrix_cell:1", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(!lock.is_locked("matrix_cell:1").await);

        let fresh = lock.acquire("matrix_cell:1", Duration::from_secs(30)).await;
        assert!(fresh.is_some());
        // The expired holder can no longer release or extend.
        assert!(!lock.release("matrix_cell:1", &stale).await);
        assert!(!lock.extend("matrix_cell:1", &stale, Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_extend_keeps_holder_valid() {
        let lock = MemoryLock::new();
        let token = lock
            .acquire("matrix_cell:1", Duration::from_millis(40))
            .await
            .unwrap();
        assert!(lock.extend("matrix_cell:1", &token, Duration::from_secs(5)).await);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(lock.is_locked("matrix_cell:1").await);
        assert!(lock.release("matrix_cell:1", &token).await);
    }

    #[tokio::test]
    async fn test_acquire_with_retry_waits_for_release() {
        let lock = std::sync::Arc::new(MemoryLock::new());
        let token = lock
            .acquire("matrix_cell:1", Duration::from_secs(30))
            .await
            .unwrap();

        let contender = lock.clone();
        let handle = tokio::spawn(async move {
            contender
                .acquire_with_retry(
                    "matrix_cell:1",
                    Duration::from_secs(30),
                    Duration::from_secs(2),
                    Duration::from_millis(10),
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        lock.release("matrix_cell:1", &token).await;
        assert!(handle.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_only_one_of_many_contenders_wins() {
        let lock = std::sync::Arc::new(MemoryLock::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let lock = lock.clone();
            handles.push(tokio::spawn(async move {
                lock.acquire("matrix_cell:7", Duration::from_secs(30)).await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
