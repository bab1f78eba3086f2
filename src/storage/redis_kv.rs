// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis-backed key/value store.
//!
//! Each trait operation maps to exactly one Redis command, so per-key
//! atomicity comes from Redis itself:
//!
//! | Operation | Command |
//! |-----------|---------|
//! | `set_with_ttl` | `SET key value PX ms` |
//! | `take` | `GETDEL key` |
//! | `get_and_refresh` | `GETEX key PX ms` |
//! | `ttl` | `PTTL key` |
//!
//! `GETDEL` and `GETEX` require Redis 6.2 or newer.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::kv::{KeyTtl, KvError, KvResult, KvStore};

#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    /// Connect to Redis (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: &str) -> KvResult<Self> {
        let client = redis::Client::open(redis_url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self { conn })
    }
}

fn backend(e: redis::RedisError) -> KvError {
    KvError::Backend(e.to_string())
}

fn ttl_millis(ttl: Duration) -> KvResult<u64> {
    let ms = u64::try_from(ttl.as_millis()).map_err(|_| KvError::InvalidTtl)?;
    if ms == 0 {
        return Err(KvError::InvalidTtl);
    }
    Ok(ms)
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let ms = ttl_millis(ttl)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ms)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn take(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn get_and_refresh(&self, key: &str, ttl: Duration) -> KvResult<Option<String>> {
        let ms = ttl_millis(ttl)?;
        let mut conn = self.conn.clone();
        redis::cmd("GETEX")
            .arg(key)
            .arg("PX")
            .arg(ms)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl> {
        let mut conn = self.conn.clone();
        let pttl: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(match pttl {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms if ms >= 0 => KeyTtl::Expires(Duration::from_millis(ms as u64)),
            other => {
                return Err(KvError::Backend(format!("unexpected PTTL reply: {other}")));
            }
        })
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_millis_rejects_zero() {
        assert!(matches!(ttl_millis(Duration::ZERO), Err(KvError::InvalidTtl)));
        assert!(matches!(
            ttl_millis(Duration::from_micros(500)),
            Err(KvError::InvalidTtl)
        ));
        assert_eq!(ttl_millis(Duration::from_secs(2)).unwrap(), 2000);
    }
}
