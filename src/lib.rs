// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth Portal - Authentication & Authorization Service
//!
//! Federated OAuth2 and local password login, sliding sessions held in a
//! key/value store, session-bound HS256 bearer tokens, and a role gate
//! evaluated on every RPC.
//!
//! ## Modules
//!
//! - `api` - RPC handlers and router (Axum)
//! - `auth` - Tokens, passwords, the role policy and the per-call gate
//! - `providers` - External OAuth2 identity providers
//! - `service` - Login use cases
//! - `storage` - Key/value stores, nonces, sessions and identities

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod service;
pub mod state;
pub mod storage;
