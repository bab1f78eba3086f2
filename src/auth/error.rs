// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gate rejection errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Code;

/// Why the gate refused a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Header present but not `Bearer <token>`
    InvalidAuthHeader,
    /// Token failed verification (signature, expiry, shape)
    InvalidToken,
    /// Internal-typed call with the wrong secret, or none configured
    InvalidInternalToken,
    /// Role lacks permission for the method
    InsufficientPermissions,
    /// Policy could not be evaluated
    PolicyUnavailable,
}

#[derive(Serialize)]
struct AuthErrorBody {
    code: Code,
    error: String,
    error_code: &'static str,
}

impl AuthError {
    /// Stable machine-readable reason.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InvalidInternalToken => "invalid_internal_token",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::PolicyUnavailable => "policy_unavailable",
        }
    }

    pub fn code(&self) -> Code {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken
            | AuthError::InvalidInternalToken => Code::Unauthenticated,
            AuthError::InsufficientPermissions => Code::PermissionDenied,
            AuthError::PolicyUnavailable => Code::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code().status()
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "missing authorization token"),
            AuthError::InvalidAuthHeader => {
                write!(f, "invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::InvalidInternalToken => write!(f, "invalid internal token"),
            AuthError::InsufficientPermissions => write!(f, "insufficient permissions"),
            AuthError::PolicyUnavailable => write!(f, "authorization check failed"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            code: self.code(),
            error: self.to_string(),
            error_code: self.error_code(),
        });
        (status, body).into_response()
    }
}
