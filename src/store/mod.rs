//! Thin async adapter over the shared key/value + list + TTL store.
//!
//! `StoreClient` is deliberately narrow: one method per primitive the rest
//! of the system needs, mirroring the teacher's `Database` trait
//! (`src/db/mod.rs`) — a single `#[async_trait]` trait with one method per
//! operation, every call returning a typed error.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Narrow async interface over a Redis-shaped key/value + list + set store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomic `SET key value NX EX ttl`. Returns `true` if the key was
    /// absent and is now set by this call.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Atomic `INCRBY key n`.
    async fn incr_by(&self, key: &str, n: i64) -> Result<i64, StoreError>;

    async fn list_right_push(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// `BLPOP key timeout`. `timeout == Duration::ZERO` is non-blocking:
    /// returns immediately with the head element if any, else `None`.
    async fn list_blocking_left_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    async fn list_len(&self, key: &str) -> Result<i64, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Evaluate a Lua script with the given keys/args. Used by the
    /// distributed mutex for compare-and-delete / compare-and-extend.
    async fn eval_int(
        &self,
        script: &redis::Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError>;
}

/// JSON convenience helpers layered over the raw byte primitives.
///
/// Values are JSON-encoded by default; a caller reading a value that turns
/// out not to be valid JSON falls back to the raw string rather than
/// failing, matching the spec's tolerance for raw string passthrough.
#[async_trait]
pub trait StoreClientJsonExt: StoreClient {
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(err) => Err(StoreError::Decode {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
            },
        }
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|err| StoreError::Decode {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        self.set(key, &bytes, ttl).await
    }
}

impl<T: StoreClient + ?Sized> StoreClientJsonExt for T {}

/// Redis-backed implementation of [`StoreClient`], pooled via `deadpool-redis`.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let cfg = PoolConfig::from_url(config.connection_url());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| StoreError::Pool(err.to_string()))?;
        // Confirm we can actually reach the server before handing back a client.
        let mut conn = pool
            .get()
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::Command)?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))
    }
}

#[async_trait]
impl StoreClient for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(StoreError::Command)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key, value, ttl.as_secs().max(1))
                    .await
                    .map_err(StoreError::Command)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(StoreError::Command)?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await.map_err(StoreError::Command)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(key).await.map_err(StoreError::Command)?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn().await?;
        let seconds: i64 = conn.ttl(key).await.map_err(StoreError::Command)?;
        Ok(if seconds >= 0 {
            Some(Duration::from_secs(seconds as u64))
        } else {
            None
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .expire(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(StoreError::Command)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::Command)?;
        Ok(result.is_some())
    }

    async fn incr_by(&self, key: &str, n: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let value: i64 = conn.incr(key, n).await.map_err(StoreError::Command)?;
        Ok(value)
    }

    async fn list_right_push(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.rpush(key, value).await.map_err(StoreError::Command)?;
        Ok(())
    }

    async fn list_blocking_left_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        if timeout.is_zero() {
            let head: Option<Vec<u8>> = conn.lpop(key, None).await.map_err(StoreError::Command)?;
            return Ok(head);
        }
        let result: Option<(String, Vec<u8>)> = conn
            .blpop(key, timeout.as_secs_f64())
            .await
            .map_err(StoreError::Command)?;
        Ok(result.map(|(_, value)| value))
    }

    async fn list_len(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let len: i64 = conn.llen(key).await.map_err(StoreError::Command)?;
        Ok(len)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.sadd(key, member).await.map_err(StoreError::Command)?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.srem(key, member).await.map_err(StoreError::Command)?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn.smembers(key).await.map_err(StoreError::Command)?;
        Ok(members)
    }

    async fn eval_int(
        &self,
        script: &redis::Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::Command)?;
        Ok(result)
    }
}
