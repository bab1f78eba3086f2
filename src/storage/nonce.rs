// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth state (CSRF nonce) records.
//!
//! A state record is written when an authorization URL is handed out and
//! consumed exactly once when the provider redirects back. Consumption is a
//! single [`KvStore::take`], so two concurrent callbacks carrying the same
//! state can never both observe it. A consumed record is gone even when
//! the subsequent validation rejects it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kv::{KvError, KvStore};
use crate::auth::random::{self, RandomError};
use crate::models::ClientMetadata;

const KEY_PREFIX: &str = "oauth_state:";

/// Persisted state record, keyed by its nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NonceError {
    #[error(transparent)]
    Store(#[from] KvError),

    #[error(transparent)]
    Random(#[from] RandomError),

    #[error("failed to encode state record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("stored state record is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

/// Reasons a consumed state record is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateRejection {
    #[error("state has expired")]
    Expired,

    #[error("user agent mismatch - possible session hijacking")]
    UserAgentMismatch,

    #[error("IP address mismatch - possible session hijacking")]
    IpAddressMismatch,
}

impl OAuthState {
    /// Check the record against the callback request.
    ///
    /// `expires_at` is checked independently of store eviction. The client
    /// binding is soft: a side that did not capture a value skips that check.
    pub fn validate(&self, client: &ClientMetadata, now: DateTime<Utc>) -> Result<(), StateRejection> {
        if now > self.expires_at {
            return Err(StateRejection::Expired);
        }
        if mismatch(self.user_agent.as_deref(), client.user_agent.as_deref()) {
            return Err(StateRejection::UserAgentMismatch);
        }
        if mismatch(self.ip_address.as_deref(), client.ip_address.as_deref()) {
            return Err(StateRejection::IpAddressMismatch);
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn mismatch(stored: Option<&str>, presented: Option<&str>) -> bool {
    match (non_empty(stored), non_empty(presented)) {
        (Some(stored), Some(presented)) => stored != presented,
        _ => false,
    }
}

pub struct NonceStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Create and persist a state record, returning its nonce.
    pub async fn issue(
        &self,
        provider: &str,
        redirect_url: Option<&str>,
        client: &ClientMetadata,
    ) -> Result<String, NonceError> {
        let nonce = random::hex_token()?;
        let created_at = Utc::now();
        let expires_at = TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|lifetime| created_at.checked_add_signed(lifetime))
            .ok_or(KvError::InvalidTtl)?;

        let record = OAuthState {
            provider: provider.to_string(),
            redirect_url: non_empty(redirect_url).map(str::to_string),
            user_agent: non_empty(client.user_agent.as_deref()).map(str::to_string),
            ip_address: non_empty(client.ip_address.as_deref()).map(str::to_string),
            created_at,
            expires_at,
        };
        let encoded = serde_json::to_string(&record).map_err(NonceError::Encode)?;

        self.kv
            .set_with_ttl(&key(&nonce), &encoded, self.ttl)
            .await?;

        debug!(
            state_prefix = random::redact(&nonce),
            provider, "issued oauth state"
        );
        Ok(nonce)
    }

    /// Atomically fetch and remove a state record.
    ///
    /// `Ok(None)` means the nonce is unknown, already used, or evicted.
    pub async fn consume(&self, nonce: &str) -> Result<Option<OAuthState>, NonceError> {
        let Some(raw) = self.kv.take(&key(nonce)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).map_err(NonceError::Corrupt)?;
        Ok(Some(record))
    }
}

fn key(nonce: &str) -> String {
    format!("{KEY_PREFIX}{nonce}")
}
