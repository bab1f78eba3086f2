// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-call authentication and authorization gate.
//!
//! Every RPC passes through [`auth_middleware`]. The decision itself lives
//! in [`AuthGate::admit`] and runs in this order:
//!
//! 1. Public methods are admitted without a credential.
//! 2. `x-token-type: internal` compares the bearer value against the
//!    configured internal secret and skips the role policy.
//! 3. Anything else must carry a valid user token, and the token's role
//!    must be granted the method by the policy table.
//!
//! When the policy failed to load, protected calls are refused with an
//! internal error unless fail-open was explicitly enabled.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, error, warn};

use super::policy::PolicyState;
use super::token::TokenIssuer;
use super::{AuthError, AuthenticatedUser};
use crate::api::methods;

/// Header selecting the credential type (`user` when absent).
pub const TOKEN_TYPE_HEADER: &str = "x-token-type";

type HmacSha256 = Hmac<Sha256>;

/// Internal service secret, compared in constant time.
///
/// The presented value and the configured secret are both run through
/// HMAC keyed with the secret, and the tags are compared with
/// `verify_slice`, so neither length nor content leaks through timing.
struct InternalSecret {
    mac: HmacSha256,
    expected_tag: Vec<u8>,
}

impl InternalSecret {
    fn new(secret: &str) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        let expected_tag = mac
            .clone()
            .chain_update(secret.as_bytes())
            .finalize()
            .into_bytes()
            .to_vec();
        Some(Self { mac, expected_tag })
    }

    fn matches(&self, presented: &str) -> bool {
        self.mac
            .clone()
            .chain_update(presented.as_bytes())
            .verify_slice(&self.expected_tag)
            .is_ok()
    }
}

/// How a call got in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Public,
    Internal,
    User(AuthenticatedUser),
}

pub struct AuthGate {
    tokens: Arc<TokenIssuer>,
    policy: PolicyState,
    fail_open: bool,
    internal: Option<InternalSecret>,
    public: HashSet<&'static str>,
}

impl AuthGate {
    pub fn new(
        tokens: Arc<TokenIssuer>,
        policy: PolicyState,
        fail_open: bool,
        internal_secret: &str,
    ) -> Self {
        if let PolicyState::Unavailable(reason) = &policy {
            if fail_open {
                error!(
                    %reason,
                    "RBAC policy unavailable and RBAC_FAIL_OPEN is set: protected calls will be admitted without authorization checks"
                );
            } else {
                error!(%reason, "RBAC policy unavailable: protected calls will be refused");
            }
        }
        let internal = InternalSecret::new(internal_secret);
        if internal.is_none() {
            warn!("no internal token configured: internal-typed calls will be refused");
        }

        Self {
            tokens,
            policy,
            fail_open,
            internal,
            public: methods::PUBLIC.into_iter().collect(),
        }
    }

    pub fn policy_ready(&self) -> bool {
        self.policy.is_ready()
    }

    pub fn is_public(&self, method: &str) -> bool {
        self.public.contains(method)
    }

    /// Decide whether a call to `method` may proceed.
    ///
    /// `authorization` is the raw header value; `None` means absent.
    pub fn admit(
        &self,
        method: &str,
        token_type: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Admission, AuthError> {
        if self.is_public(method) {
            return Ok(Admission::Public);
        }

        let bearer = bearer_token(authorization.ok_or(AuthError::MissingAuthHeader)?)?;

        if is_internal(token_type) {
            return match &self.internal {
                Some(secret) if secret.matches(bearer) => {
                    debug!(method, "internal call admitted");
                    Ok(Admission::Internal)
                }
                _ => {
                    warn!(method, "internal call with invalid token");
                    Err(AuthError::InvalidInternalToken)
                }
            };
        }

        let claims = self.tokens.verify(bearer).map_err(|e| {
            debug!(method, error = %e, "token rejected");
            AuthError::InvalidToken
        })?;
        let user = AuthenticatedUser::from(claims);

        match self.policy.evaluate(user.role, method) {
            Ok(true) => Ok(Admission::User(user)),
            Ok(false) => {
                debug!(method, user_id = %user.user_id, role = %user.role, "permission denied");
                Err(AuthError::InsufficientPermissions)
            }
            Err(e) if self.fail_open => {
                warn!(method, user_id = %user.user_id, error = %e, "admitting without policy check (fail-open)");
                Ok(Admission::User(user))
            }
            Err(e) => {
                error!(method, error = %e, "authorization check failed");
                Err(AuthError::PolicyUnavailable)
            }
        }
    }
}

fn is_internal(token_type: Option<&str>) -> bool {
    token_type.is_some_and(|t| t.trim().eq_ignore_ascii_case("internal"))
}

fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AuthError> {
    headers
        .get(name)
        .map(|value| value.to_str().map_err(|_| AuthError::InvalidAuthHeader))
        .transpose()
}

/// Axum middleware wrapping every RPC route.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route(methods::GET_USER, post(users::get_user))
///     .layer(axum::middleware::from_fn_with_state(gate, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.uri().path().to_string();
    let headers = request.headers();

    let admission = header_str(headers, AUTHORIZATION.as_str()).and_then(|authorization| {
        let token_type = header_str(headers, TOKEN_TYPE_HEADER).unwrap_or(None);
        gate.admit(&method, token_type, authorization)
    });

    match admission {
        Ok(Admission::User(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(_) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{policy::PolicyEngine, Role};
    use chrono::{TimeDelta, Utc};

    const SECRET: &[u8] = b"gate-secret";
    const INTERNAL: &str = "internal-secret";

    fn gate_with(policy: PolicyState, fail_open: bool) -> AuthGate {
        AuthGate::new(Arc::new(TokenIssuer::new(SECRET)), policy, fail_open, INTERNAL)
    }

    fn gate() -> AuthGate {
        gate_with(PolicyEngine::builtin().into(), false)
    }

    fn bearer(role: Role) -> String {
        let token = TokenIssuer::new(SECRET)
            .issue("user-1", role, Utc::now() + TimeDelta::hours(1))
            .unwrap();
        format!("Bearer {token}")
    }

    #[test]
    fn public_methods_need_no_credential() {
        let gate = gate();
        for method in methods::PUBLIC {
            assert_eq!(gate.admit(method, None, None), Ok(Admission::Public));
        }
    }

    #[test]
    fn missing_or_malformed_header_is_unauthenticated() {
        let gate = gate();
        assert_eq!(
            gate.admit(methods::GET_USER, None, None),
            Err(AuthError::MissingAuthHeader)
        );
        for header in ["", "Bearer", "Bearer   ", "Basic abc", "token-without-scheme"] {
            assert_eq!(
                gate.admit(methods::GET_USER, None, Some(header)),
                Err(AuthError::InvalidAuthHeader),
                "header {header:?}"
            );
        }
        assert_eq!(
            gate.admit(methods::GET_USER, None, Some("Bearer not.a.jwt")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn user_token_admitted_by_policy() {
        let gate = gate();
        let header = bearer(Role::User);

        match gate.admit(methods::GET_CURRENT_USER, None, Some(&header)) {
            Ok(Admission::User(user)) => {
                assert_eq!(user.user_id, "user-1");
                assert_eq!(user.role, Role::User);
            }
            other => panic!("unexpected admission: {other:?}"),
        }
        assert_eq!(
            gate.admit(methods::LIST_USERS, Some("user"), Some(&header)),
            Err(AuthError::InsufficientPermissions)
        );
    }

    #[test]
    fn admin_admitted_everywhere() {
        let gate = gate();
        let header = bearer(Role::Admin);
        for method in methods::PROTECTED {
            assert!(
                matches!(gate.admit(method, None, Some(&header)), Ok(Admission::User(_))),
                "{method}"
            );
        }
    }

    #[test]
    fn unknown_token_type_is_treated_as_user() {
        let gate = gate();
        let header = bearer(Role::User);
        assert!(matches!(
            gate.admit(methods::GET_USER, Some("service"), Some(&header)),
            Ok(Admission::User(_))
        ));
    }

    #[test]
    fn internal_secret_bypasses_policy() {
        let gate = gate();
        let header = format!("Bearer {INTERNAL}");
        assert_eq!(
            gate.admit(methods::DELETE_USER, Some("internal"), Some(&header)),
            Ok(Admission::Internal)
        );
        assert_eq!(
            gate.admit(methods::DELETE_USER, Some("Internal"), Some("Bearer wrong")),
            Err(AuthError::InvalidInternalToken)
        );
    }

    #[test]
    fn user_token_is_not_an_internal_secret() {
        let gate = gate();
        let header = bearer(Role::Admin);
        assert_eq!(
            gate.admit(methods::GET_USER, Some("internal"), Some(&header)),
            Err(AuthError::InvalidInternalToken)
        );
    }

    #[test]
    fn unconfigured_internal_secret_refuses_internal_calls() {
        let gate = AuthGate::new(
            Arc::new(TokenIssuer::new(SECRET)),
            PolicyEngine::builtin().into(),
            false,
            "",
        );
        assert_eq!(
            gate.admit(methods::GET_USER, Some("internal"), Some("Bearer anything")),
            Err(AuthError::InvalidInternalToken)
        );
    }

    #[test]
    fn unavailable_policy_fails_closed_by_default() {
        let gate = gate_with(PolicyState::Unavailable("boom".to_string()), false);
        let header = bearer(Role::Admin);
        assert_eq!(
            gate.admit(methods::GET_USER, None, Some(&header)),
            Err(AuthError::PolicyUnavailable)
        );
        // Public methods are unaffected.
        assert_eq!(
            gate.admit(methods::LOGIN_BY_PASSWORD, None, None),
            Ok(Admission::Public)
        );
    }

    #[test]
    fn unavailable_policy_admits_when_fail_open() {
        let gate = gate_with(PolicyState::Unavailable("boom".to_string()), true);
        let header = bearer(Role::User);
        assert!(matches!(
            gate.admit(methods::LIST_USERS, None, Some(&header)),
            Ok(Admission::User(_))
        ));
        // The token is still verified.
        assert_eq!(
            gate.admit(methods::LIST_USERS, None, Some("Bearer forged")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("bearer abc"), Ok("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Ok("abc"));
    }
}
