// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Cross-request state for the auth service.
//!
//! ## Layout
//!
//! ```text
//! KvStore (trait)
//!   MemoryKvStore     in-process LRU with lazy expiry
//!   RedisKvStore      feature "redis"
//!
//! NonceStore          oauth_state:<nonce>   single-use, fixed TTL
//! SessionStore        session:<id>          sliding TTL
//!
//! IdentityRepository (trait)
//!   MemoryIdentityRepository
//! ```
//!
//! ## Important Notes
//!
//! - Nonce consumption is one atomic `take`; never a read plus a delete
//! - Session lookup and TTL refresh are one atomic `get_and_refresh`
//! - Nothing here retries; a backend failure surfaces to the caller

pub mod identity;
pub mod kv;
pub mod memory;
pub mod nonce;
#[cfg(feature = "redis")]
pub mod redis_kv;
pub mod session;

pub use identity::{IdentityRepository, MemoryIdentityRepository, RepositoryError};
pub use kv::{KeyTtl, KvError, KvResult, KvStore};
pub use memory::MemoryKvStore;
pub use nonce::{NonceError, NonceStore, OAuthState, StateRejection};
#[cfg(feature = "redis")]
pub use redis_kv::RedisKvStore;
pub use session::{SessionError, SessionStore};
