// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login sessions with a sliding TTL.
//!
//! A session is an opaque 256-bit id mapped to a user id. Every successful
//! [`SessionStore::resolve`] resets the TTL to the full configured lifetime
//! in the same store operation that reads it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use super::kv::{KeyTtl, KvError, KvStore};
use crate::auth::random::{self, RandomError};

const KEY_PREFIX: &str = "session:";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found or expired")]
    NotFound,

    /// The key exists without a TTL, which the store never writes.
    #[error("session has no expiry")]
    NoExpiry,

    #[error(transparent)]
    Store(#[from] KvError),

    #[error(transparent)]
    Random(#[from] RandomError),
}

pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Start a session for `user_id` and return its id.
    pub async fn create(&self, user_id: &str) -> Result<String, SessionError> {
        let session_id = random::hex_token()?;
        self.kv
            .set_with_ttl(&key(&session_id), user_id, self.ttl)
            .await?;

        info!(
            user_id,
            session_prefix = random::redact(&session_id),
            ttl_secs = self.ttl.as_secs(),
            "session created"
        );
        Ok(session_id)
    }

    /// Look up the session owner and slide the expiry forward.
    pub async fn resolve(&self, session_id: &str) -> Result<String, SessionError> {
        let user_id = self
            .kv
            .get_and_refresh(&key(session_id), self.ttl)
            .await?
            .ok_or(SessionError::NotFound)?;

        debug!(
            session_prefix = random::redact(session_id),
            "session refreshed"
        );
        Ok(user_id)
    }

    /// Absolute time at which the session currently expires.
    pub async fn remaining_expiry(&self, session_id: &str) -> Result<DateTime<Utc>, SessionError> {
        let remaining = match self.kv.ttl(&key(session_id)).await? {
            KeyTtl::Missing => return Err(SessionError::NotFound),
            KeyTtl::Persistent => return Err(SessionError::NoExpiry),
            KeyTtl::Expires(remaining) => remaining,
        };
        TimeDelta::from_std(remaining)
            .ok()
            .and_then(|remaining| Utc::now().checked_add_signed(remaining))
            .ok_or(SessionError::NoExpiry)
    }

    /// Delete a session. Returns whether one was removed.
    pub async fn revoke(&self, session_id: &str) -> Result<bool, SessionError> {
        let removed = self.kv.delete(&key(session_id)).await?;
        if removed {
            info!(
                session_prefix = random::redact(session_id),
                "session revoked"
            );
        }
        Ok(removed)
    }
}

fn key(session_id: &str) -> String {
    format!("{KEY_PREFIX}{session_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn store() -> (SessionStore, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::default());
        (SessionStore::new(kv.clone(), HOUR), kv)
    }

    #[tokio::test]
    async fn create_then_resolve() {
        let (sessions, kv) = store();
        let id = sessions.create("user-1").await.unwrap();

        assert_eq!(id.len(), 64);
        assert_eq!(
            kv.get(&format!("session:{id}")).await.unwrap().as_deref(),
            Some("user-1")
        );
        assert_eq!(sessions.resolve(&id).await.unwrap(), "user-1");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (sessions, _) = store();
        assert!(matches!(
            sessions.resolve("missing").await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(
            sessions.remaining_expiry("missing").await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_slides_expiry_to_full_lifetime() {
        let (sessions, kv) = store();
        let id = sessions.create("user-1").await.unwrap();
        let session_key = format!("session:{id}");

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert_eq!(
            kv.ttl(&session_key).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(1800))
        );

        sessions.resolve(&id).await.unwrap();
        assert_eq!(kv.ttl(&session_key).await.unwrap(), KeyTtl::Expires(HOUR));

        // Activity keeps the session alive past its original deadline.
        tokio::time::advance(Duration::from_secs(3000)).await;
        assert_eq!(sessions.resolve(&id).await.unwrap(), "user-1");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_expires() {
        let (sessions, _) = store();
        let id = sessions.create("user-1").await.unwrap();

        tokio::time::advance(HOUR + Duration::from_secs(1)).await;
        assert!(matches!(
            sessions.resolve(&id).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn remaining_expiry_is_about_one_lifetime_away() {
        let (sessions, _) = store();
        let id = sessions.create("user-1").await.unwrap();

        let expiry = sessions.remaining_expiry(&id).await.unwrap();
        let delta = expiry - Utc::now();
        assert!(delta <= TimeDelta::hours(1));
        assert!(delta > TimeDelta::hours(1) - TimeDelta::seconds(5));
    }

    #[tokio::test]
    async fn persistent_key_has_no_expiry() {
        let (sessions, kv) = store();
        kv.insert_persistent("session:forever", "user-1");
        assert!(matches!(
            sessions.remaining_expiry("forever").await,
            Err(SessionError::NoExpiry)
        ));
    }

    #[tokio::test]
    async fn revoke_removes_session() {
        let (sessions, _) = store();
        let id = sessions.create("user-1").await.unwrap();

        assert!(sessions.revoke(&id).await.unwrap());
        assert!(!sessions.revoke(&id).await.unwrap());
        assert!(matches!(
            sessions.resolve(&id).await,
            Err(SessionError::NotFound)
        ));
    }
}
