// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key/value store abstraction backing OAuth state and sessions.
//!
//! Every operation is atomic per key with respect to concurrent callers.
//! Nonce consumption relies on [`KvStore::take`] being a single
//! remove-and-return primitive; callers must never emulate it with a
//! `get` followed by a `delete`.

use std::time::Duration;

use async_trait::async_trait;

/// Error type for key/value store operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("TTL must be greater than zero and within the clock range")]
    InvalidTtl,

    #[error("store full of live keys")]
    Full,
}

pub type KvResult<T> = Result<T, KvError>;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (or already expired).
    Missing,
    /// Key exists but never expires.
    Persistent,
    /// Key expires after the given duration.
    Expires(Duration),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value without touching its TTL.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Write a value that expires after `ttl`, replacing any previous value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Atomically read and delete a value.
    async fn take(&self, key: &str) -> KvResult<Option<String>>;

    /// Atomically read a value and reset its TTL to `ttl` from now.
    async fn get_and_refresh(&self, key: &str, ttl: Duration) -> KvResult<Option<String>>;

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl>;

    /// Delete a key. Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> KvResult<bool>;

    /// Backend liveness check.
    async fn ping(&self) -> KvResult<()>;
}
