// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthGate, PolicyEngine, PolicyState, TokenIssuer};
use crate::config::AppConfig;
use crate::providers::ProviderRegistry;
use crate::service::AuthOrchestrator;
use crate::storage::{IdentityRepository, KvStore, NonceStore, SessionStore};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthOrchestrator>,
    pub identities: Arc<dyn IdentityRepository>,
    pub kv: Arc<dyn KvStore>,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    /// Wire the stores, token issuer, gate and orchestrator from config.
    ///
    /// A policy that fails to load does not abort startup; the gate then
    /// refuses protected calls (or admits them when fail-open is set).
    pub fn new(
        config: &AppConfig,
        kv: Arc<dyn KvStore>,
        identities: Arc<dyn IdentityRepository>,
        providers: ProviderRegistry,
    ) -> Self {
        let tokens = Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes()));
        let policy: PolicyState = PolicyEngine::load(config.policy_path.as_deref()).into();
        let gate = Arc::new(AuthGate::new(
            tokens.clone(),
            policy,
            config.policy_fail_open,
            &config.internal_token,
        ));

        let auth = Arc::new(AuthOrchestrator::new(
            NonceStore::new(kv.clone(), config.oauth_state_ttl),
            SessionStore::new(kv.clone(), config.session_ttl),
            tokens,
            identities.clone(),
            providers,
        ));

        Self {
            auth,
            identities,
            kv,
            gate,
        }
    }
}
