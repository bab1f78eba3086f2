// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Use-case layer between the RPC handlers and the stores.

pub mod auth;

pub use auth::AuthOrchestrator;
