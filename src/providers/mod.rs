// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External OAuth2 identity providers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub mod github;

pub use github::GithubProvider;

/// Account details returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Provider-specific stable account id.
    pub external_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} configuration missing: {field}")]
    MissingConfig { provider: &'static str, field: &'static str },

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider response was invalid: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Authorization URL the client is sent to, carrying `state`.
    fn authorize_url(&self, state: &str, redirect_url: &str) -> String;

    fn default_redirect_url(&self) -> &str;

    /// Trade an authorization code for an access token.
    async fn exchange_code(&self, code: &str, redirect_url: &str) -> Result<String, ProviderError>;

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ProviderError>;
}

/// Configured providers by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn with(mut self, name: impl Into<String>, provider: Arc<dyn OAuthProvider>) -> Self {
        self.register(name, provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
