//! Distributed mutex over the shared store.
//!
//! Acquisition is `SET key token NX EX ttl`; release and extension are both
//! single Lua scripts so the compare-and-act pair is atomic — a lock that
//! expired and was re-acquired by someone else is never touched by a stale
//! owner's release or extend.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use redis::Script;
use uuid::Uuid;

use crate::error::LockError;
use crate::store::StoreClient;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

fn lock_key(name: &str) -> String {
    format!("redis_lock:{name}")
}

fn new_token() -> String {
    let mut rng = rand::thread_rng();
    format!("{}-{}", Uuid::new_v4(), rng.gen::<u32>())
}

/// A handle on a held lock. Dropping it does **not** release the lock —
/// release is async, so callers must call [`DistributedMutex::release`]
/// (or go through [`DistributedMutex::with_lock`], which always does).
#[derive(Debug, Clone)]
pub struct LockHandle {
    pub name: String,
    pub token: String,
}

/// Distributed mutual exclusion backed by the shared store.
pub struct DistributedMutex {
    store: Arc<dyn StoreClient>,
}

impl DistributedMutex {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Try once to acquire `name` for `ttl`. Returns `None` if already held.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockHandle>, LockError> {
        let token = new_token();
        let acquired = self
            .store
            .set_if_absent(&lock_key(name), &token, ttl)
            .await?;
        Ok(acquired.then_some(LockHandle {
            name: name.to_string(),
            token,
        }))
    }

    /// Poll [`acquire`](Self::acquire) until it succeeds or `wait_timeout` elapses.
    pub async fn acquire_blocking(
        &self,
        name: &str,
        ttl: Duration,
        wait_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<LockHandle, LockError> {
        let deadline = tokio::time::Instant::now() + wait_timeout;
        loop {
            if let Some(handle) = self.acquire(name, ttl).await? {
                return Ok(handle);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LockError::NotOwner {
                    name: name.to_string(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Release `handle` iff it is still the current holder. A no-op (not
    /// an error) if the lock already expired and was taken by someone else.
    pub async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        let script = Script::new(RELEASE_SCRIPT);
        self.store
            .eval_int(&script, &[&lock_key(&handle.name)], &[&handle.token])
            .await?;
        Ok(())
    }

    /// Extend `handle`'s TTL iff it is still the current holder.
    pub async fn extend(&self, handle: &LockHandle, ttl: Duration) -> Result<bool, LockError> {
        let script = Script::new(EXTEND_SCRIPT);
        let millis = ttl.as_millis().to_string();
        let result = self
            .store
            .eval_int(
                &script,
                &[&lock_key(&handle.name)],
                &[&handle.token, &millis],
            )
            .await?;
        Ok(result == 1)
    }

    /// Acquire `name`, run `f`, then release — even if `f` returns an error.
    pub async fn with_lock<F, Fut, T, E>(
        &self,
        name: &str,
        ttl: Duration,
        wait_timeout: Duration,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let handle = self
            .acquire_blocking(name, ttl, wait_timeout, Duration::from_millis(50))
            .await?;
        let result = f().await;
        if let Err(release_err) = self.release(&handle).await {
            tracing::warn!("failed to release lock {}: {release_err}", handle.name);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_namespaced() {
        assert_eq!(lock_key("registry"), "redis_lock:registry");
    }

    #[test]
    fn tokens_are_distinct() {
        assert_ne!(new_token(), new_token());
    }
}
