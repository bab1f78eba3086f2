// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// The set is closed. Anything unrecognized while decoding (an unknown
/// name, an unknown numeric code, a wrong JSON type) becomes `User`, the
/// least-privileged role, instead of failing.
///
/// Numeric codes are what tokens carry: `User = 1`, `Admin = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account
    #[default]
    User,
    /// Granted every registered method
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// Wire code carried in token claims.
    pub fn code(self) -> i32 {
        match self {
            Role::User => 1,
            Role::Admin => 2,
        }
    }

    pub fn from_code(code: i64) -> Role {
        match code {
            2 => Role::Admin,
            _ => Role::User,
        }
    }

    /// Strict, case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Role> {
        match name.to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(n) => n.as_i64().map(Role::from_code).unwrap_or_default(),
            serde_json::Value::String(s) => Role::from_name(&s).unwrap_or_default(),
            _ => Role::User,
        })
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
