// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Credentials, tokens and the per-call authorization gate.
//!
//! ## Auth Flow
//!
//! 1. Client logs in (OAuth or password) and receives a session id
//! 2. Client exchanges the session id for a bearer token via `GetUserToken`
//! 3. Client sends `Authorization: Bearer <token>` on protected calls
//! 4. The gate:
//!    - Admits public methods without a credential
//!    - Verifies the HS256 token (signature, `exp`, claim shape)
//!    - Checks the role against the RBAC policy table
//!
//! ## Security
//!
//! - Token `exp` equals the session expiry at issuance; no leeway
//! - Internal service calls (`x-token-type: internal`) use a shared secret
//!   compared in constant time and bypass the role policy
//! - Policy load failure fails closed unless explicitly configured otherwise

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod random;
pub mod roles;
pub mod token;

pub use claims::{AuthenticatedUser, TokenClaims};
pub use error::AuthError;
pub use extractor::{Auth, ClientInfo};
pub use middleware::{auth_middleware, Admission, AuthGate};
pub use policy::{PolicyEngine, PolicyError, PolicyState};
pub use roles::Role;
pub use token::{TokenError, TokenIssuer};
