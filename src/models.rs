// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the RPC surface, plus the identity record
//! owned by the identity repository. Wire types derive `Serialize`,
//! `Deserialize` and `ToSchema` for JSON handling and OpenAPI generation.
//!
//! Request fields default to empty when absent so that missing input is
//! reported as `invalid_argument` by the service rather than rejected by the
//! JSON extractor.
//!
//! ## Model Categories
//!
//! - **Identity**: stored account record and its public `User` projection
//! - **Auth**: OAuth URL, login, token exchange and logout messages
//! - **Client metadata**: request-derived user agent and IP address

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

// =============================================================================
// Identity
// =============================================================================

/// Account record held by the identity repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// OAuth provider that created the account, if any.
    pub provider: Option<String>,
    /// Provider-specific account id.
    pub external_id: Option<String>,
    /// Argon2 PHC string; `None` for OAuth-only accounts.
    pub hashed_password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// A fresh `User`-role identity.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role: Role::User,
            provider: None,
            external_id: None,
            hashed_password: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn has_password(&self) -> bool {
        self.hashed_password
            .as_deref()
            .is_some_and(|hash| !hash.is_empty())
    }
}

/// Public view of an identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&Identity> for User {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            provider: identity.provider.clone(),
            created_at: identity.created_at,
            updated_at: identity.updated_at,
            last_login_at: identity.last_login_at,
        }
    }
}

// =============================================================================
// Client Metadata
// =============================================================================

/// Request-derived values bound into OAuth state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

// =============================================================================
// Auth Service Messages
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GetOAuthCodeUrlRequest {
    /// Provider name, e.g. `github`
    pub provider: String,
    /// Overrides the provider's configured redirect URL
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GetOAuthCodeUrlResponse {
    /// Provider authorization URL with `state` embedded
    pub url: String,
    /// Single-use CSRF nonce (64 hex characters)
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginByOAuthRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginByPasswordRequest {
    pub email: String,
    pub password: String,
}

/// Session descriptor returned by both login paths.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginSession {
    /// Opaque session id (64 hex characters)
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GetUserTokenRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserToken {
    /// HS256 bearer token
    pub token: String,
    /// Equal to the token's `exp` claim and to the session expiry at issuance
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LogoutRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    /// Whether a live session was removed
    pub revoked: bool,
}

// =============================================================================
// User Service Messages
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GetUserRequest {
    pub id: String,
}
