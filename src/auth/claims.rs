// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated caller.

use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by a bearer token.
///
/// `exp` is the absolute expiry (Unix seconds) of the session the token
/// was derived from. The role travels as its numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    #[serde(serialize_with = "role_as_code")]
    pub user_role: Role,
    pub exp: i64,
}

fn role_as_code<S: Serializer>(role: &Role, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i32(role.code())
}

/// Caller identity attached to a request once the gate admits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<TokenClaims> for AuthenticatedUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.user_role,
        }
    }
}
