// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process key/value store with per-key TTLs.
//!
//! Used when no external store is configured and in tests. Entries live in
//! an LRU cache bounded by `capacity`; expiry is checked lazily on access.
//! A live entry is never evicted: when a new key arrives at capacity the
//! expired entries are swept, and if the cache is still full of live keys
//! the write fails with [`KvError::Full`]. All operations run under one
//! mutex, so each is atomic.
//!
//! Deadlines use `tokio::time::Instant`, which lets tests drive expiry with
//! `tokio::time::pause()` / `advance()`.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;

use super::kv::{KeyTtl, KvError, KvResult, KvStore};

/// Default maximum number of keys held in memory.
pub const DEFAULT_CAPACITY: usize = 100_000;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

pub struct MemoryKvStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryKvStore {
    /// Create a store holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, LruCache<String, Entry>>> {
        self.entries.lock().map_err(|_| KvError::Poisoned)
    }

    /// Insert a key without expiry.
    #[cfg(test)]
    pub(crate) fn insert_persistent(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.lock() {
            entries.put(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn purge_expired(entries: &mut LruCache<String, Entry>, key: &str, now: Instant) {
    if entries.peek(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.pop(key);
    }
}

fn purge_all_expired(entries: &mut LruCache<String, Entry>, now: Instant) {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| !entry.is_live(now))
        .map(|(key, _)| key.clone())
        .collect();
    for key in expired {
        entries.pop(&key);
    }
}

/// Make room for `key` without evicting a live entry.
fn reserve(entries: &mut LruCache<String, Entry>, key: &str, now: Instant) -> KvResult<()> {
    if entries.contains(key) || entries.len() < entries.cap().get() {
        return Ok(());
    }
    purge_all_expired(entries, now);
    if entries.len() < entries.cap().get() {
        Ok(())
    } else {
        Err(KvError::Full)
    }
}

fn deadline(ttl: Duration) -> KvResult<Instant> {
    if ttl.is_zero() {
        return Err(KvError::InvalidTtl);
    }
    Instant::now().checked_add(ttl).ok_or(KvError::InvalidTtl)
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.lock()?;
        purge_expired(&mut entries, key, Instant::now());
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let expires_at = deadline(ttl)?;
        let mut entries = self.lock()?;
        reserve(&mut entries, key, Instant::now())?;
        entries.put(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(entries
            .pop(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn get_and_refresh(&self, key: &str, ttl: Duration) -> KvResult<Option<String>> {
        let expires_at = deadline(ttl)?;
        let mut entries = self.lock()?;
        purge_expired(&mut entries, key, Instant::now());
        Ok(entries.get_mut(key).map(|entry| {
            entry.expires_at = Some(expires_at);
            entry.value.clone()
        }))
    }

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        purge_expired(&mut entries, key, now);
        Ok(match entries.peek(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(deadline),
                ..
            }) => KeyTtl::Expires(deadline.saturating_duration_since(now)),
        })
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(entries.pop(key).is_some_and(|entry| entry.is_live(now)))
    }

    async fn ping(&self) -> KvResult<()> {
        self.lock().map(|_| ())
    }
}
