// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-based access policy.
//!
//! The policy is a static role → method-pattern table, loaded once at
//! startup and never re-read. Document format:
//!
//! ```json
//! { "roles": { "admin": ["*"], "user": ["/user.v1.UserService/GetUser"] } }
//! ```
//!
//! Patterns are an exact full method name, a service wildcard such as
//! `/user.v1.UserService/*`, or `*` for every method. Roles missing from
//! the document are granted nothing.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::roles::Role;

/// Policy shipped with the binary.
pub const BUILTIN_POLICY: &str = include_str!("../../config/rbac_policy.json");

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("policy document is invalid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown role in policy: {0}")]
    UnknownRole(String),

    #[error("invalid method pattern for role {role}: {pattern:?}")]
    InvalidPattern { role: String, pattern: String },

    #[error("policy unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Any,
    /// Service prefix including the trailing slash, e.g. `/user.v1.UserService/`.
    Service(String),
    Exact(String),
}

impl Pattern {
    fn parse(raw: &str) -> Option<Pattern> {
        let raw = raw.trim();
        if raw == "*" {
            return Some(Pattern::Any);
        }
        if !raw.starts_with('/') || raw.len() < 2 {
            return None;
        }
        if let Some(service) = raw.strip_suffix('*') {
            // Only a whole-service wildcard is supported.
            if !service.ends_with('/') || service.len() < 3 || service.contains('*') {
                return None;
            }
            return Some(Pattern::Service(service.to_string()));
        }
        if raw.contains('*') {
            return None;
        }
        Some(Pattern::Exact(raw.to_string()))
    }

    fn matches(&self, method: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Service(prefix) => method
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/')),
            Pattern::Exact(exact) => exact == method,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    roles: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct PolicyEngine {
    grants: HashMap<Role, Vec<Pattern>>,
}

impl PolicyEngine {
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = serde_json::from_str(document)?;
        let mut grants: HashMap<Role, Vec<Pattern>> = HashMap::new();

        for (name, patterns) in document.roles {
            let role =
                Role::from_name(&name).ok_or_else(|| PolicyError::UnknownRole(name.clone()))?;
            let parsed = patterns
                .iter()
                .map(|raw| {
                    Pattern::parse(raw).ok_or_else(|| PolicyError::InvalidPattern {
                        role: name.clone(),
                        pattern: raw.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            grants.entry(role).or_default().extend(parsed);
        }

        Ok(Self { grants })
    }

    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let document = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&document)
    }

    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_json(BUILTIN_POLICY)
    }

    /// Load from `path`, or the built-in table when no path is configured.
    pub fn load(path: Option<&Path>) -> Result<Self, PolicyError> {
        let engine = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::builtin()?,
        };
        info!(
            source = path.map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".to_string()),
            rules = engine.rule_count(),
            "RBAC policy loaded"
        );
        Ok(engine)
    }

    pub fn is_allowed(&self, role: Role, method: &str) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|patterns| patterns.iter().any(|p| p.matches(method)))
    }

    fn rule_count(&self) -> usize {
        self.grants.values().map(Vec::len).sum()
    }
}

/// Outcome of loading the policy at startup.
///
/// A failed load is kept rather than aborting startup so the gate can
/// apply the configured fail-closed or fail-open behaviour.
#[derive(Debug, Clone)]
pub enum PolicyState {
    Ready(PolicyEngine),
    Unavailable(String),
}

impl PolicyState {
    pub fn evaluate(&self, role: Role, method: &str) -> Result<bool, PolicyError> {
        match self {
            PolicyState::Ready(engine) => Ok(engine.is_allowed(role, method)),
            PolicyState::Unavailable(reason) => Err(PolicyError::Unavailable(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PolicyState::Ready(_))
    }
}

impl From<Result<PolicyEngine, PolicyError>> for PolicyState {
    fn from(result: Result<PolicyEngine, PolicyError>) -> Self {
        match result {
            Ok(engine) => PolicyState::Ready(engine),
            Err(e) => PolicyState::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::methods;

    #[test]
    fn builtin_admin_may_call_every_protected_method() {
        let engine = PolicyEngine::builtin().unwrap();
        for method in methods::PROTECTED {
            assert!(engine.is_allowed(Role::Admin, method), "{method}");
        }
    }

    #[test]
    fn builtin_user_may_only_read() {
        let engine = PolicyEngine::builtin().unwrap();
        assert!(engine.is_allowed(Role::User, methods::GET_USER));
        assert!(engine.is_allowed(Role::User, methods::GET_CURRENT_USER));

        for method in [
            methods::CREATE_USER,
            methods::UPDATE_USER,
            methods::DELETE_USER,
            methods::LIST_USERS,
        ] {
            assert!(!engine.is_allowed(Role::User, method), "{method}");
        }
    }

    #[test]
    fn service_wildcard_matches_only_that_service() {
        let engine = PolicyEngine::from_json(
            r#"{"roles":{"user":["/user.v1.UserService/*"]}}"#,
        )
        .unwrap();
        assert!(engine.is_allowed(Role::User, "/user.v1.UserService/ListUsers"));
        assert!(!engine.is_allowed(Role::User, "/billing.v1.BillingService/Charge"));
        assert!(!engine.is_allowed(Role::User, "/user.v1.UserService/"));
        assert!(!engine.is_allowed(Role::Admin, "/user.v1.UserService/ListUsers"));
    }

    #[test]
    fn role_names_are_case_insensitive_and_merge() {
        let engine = PolicyEngine::from_json(
            r#"{"roles":{"USER":["/a.v1.A/One"],"user":["/a.v1.A/Two"]}}"#,
        )
        .unwrap();
        assert!(engine.is_allowed(Role::User, "/a.v1.A/One"));
        assert!(engine.is_allowed(Role::User, "/a.v1.A/Two"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = PolicyEngine::from_json(r#"{"roles":{"auditor":["*"]}}"#);
        assert!(matches!(result, Err(PolicyError::UnknownRole(name)) if name == "auditor"));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        for pattern in ["GetUser", "/svc/Get*", "/*", "/a/*/b", ""] {
            let document = format!(r#"{{"roles":{{"user":["{pattern}"]}}}}"#);
            assert!(
                matches!(
                    PolicyEngine::from_json(&document),
                    Err(PolicyError::InvalidPattern { .. })
                ),
                "accepted {pattern:?}"
            );
        }
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        assert!(matches!(
            PolicyEngine::from_json("{roles:"),
            Err(PolicyError::Parse(_))
        ));
        assert!(matches!(
            PolicyEngine::from_json(r#"{"roles":{},"extra":1}"#),
            Err(PolicyError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_fails_to_load() {
        let result = PolicyEngine::load(Some(Path::new("/nonexistent/rbac_policy.json")));
        assert!(matches!(result, Err(PolicyError::Read { .. })));
    }

    #[test]
    fn unavailable_state_reports_error() {
        let state = PolicyState::from(PolicyEngine::from_json("nope"));
        assert!(!state.is_ready());
        assert!(matches!(
            state.evaluate(Role::Admin, methods::GET_USER),
            Err(PolicyError::Unavailable(_))
        ));

        let ready = PolicyState::from(PolicyEngine::builtin());
        assert!(ready.evaluate(Role::User, methods::GET_USER).unwrap());
        assert!(!ready.evaluate(Role::User, methods::LIST_USERS).unwrap());
    }
}
