// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GitHub OAuth2 integration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{OAuthProvider, ProviderError, ProviderIdentity};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_BASE_URL: &str = "https://api.github.com";
const SCOPE: &str = "user:email";
const USER_AGENT: &str = concat!("auth-portal-server/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct GithubProvider {
    client_id: String,
    client_secret: String,
    redirect_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

impl GithubProvider {
    pub fn new(config: GithubConfig) -> Result<Self, ProviderError> {
        if config.client_id.trim().is_empty() {
            return Err(ProviderError::MissingConfig {
                provider: "github",
                field: "client_id",
            });
        }
        if config.client_secret.trim().is_empty() {
            return Err(ProviderError::MissingConfig {
                provider: "github",
                field: "client_secret",
            });
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_url: config.redirect_url,
            http,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(format!("{API_BASE_URL}{path}"))
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn authorize_url(&self, state: &str, redirect_url: &str) -> String {
        build_authorize_url(&self.client_id, redirect_url, state)
    }

    fn default_redirect_url(&self) -> &str {
        &self.redirect_url
    }

    async fn exchange_code(&self, code: &str, redirect_url: &str) -> Result<String, ProviderError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];
        if !redirect_url.is_empty() {
            form.push(("redirect_uri", redirect_url));
        }

        let response = self
            .http
            .post(ACCESS_TOKEN_URL)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Exchange(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Exchange(format!(
                "token request returned {status}: {body}"
            )));
        }

        let token_response: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Exchange(format!("invalid token response: {e}")))?;

        access_token_from(token_response)
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let user: GithubUser = self.get_json("/user", access_token).await?;

        let email = match user.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) => email.to_string(),
            None => {
                debug!(github_id = user.id, "profile email is private, reading /user/emails");
                let emails: Vec<GithubEmail> = self.get_json("/user/emails", access_token).await?;
                primary_verified_email(&emails).ok_or_else(|| {
                    ProviderError::InvalidResponse("account has no verified email".to_string())
                })?
            }
        };

        Ok(identity_from(user, email))
    }
}

fn build_authorize_url(client_id: &str, redirect_url: &str, state: &str) -> String {
    let mut params = vec![("client_id", client_id)];
    if !redirect_url.is_empty() {
        params.push(("redirect_uri", redirect_url));
    }
    params.extend([("scope", SCOPE), ("state", state), ("access_type", "offline")]);

    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&params)
        .finish();
    format!("{AUTHORIZE_URL}?{query}")
}

fn access_token_from(response: AccessTokenResponse) -> Result<String, ProviderError> {
    if let Some(error) = response.error {
        let description = response.error_description.unwrap_or_default();
        return Err(ProviderError::Exchange(format!("{error}: {description}")));
    }
    response
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::Exchange("token response did not include access_token".to_string())
        })
}

/// Primary verified address, else any verified one.
fn primary_verified_email(emails: &[GithubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}

fn identity_from(user: GithubUser, email: String) -> ProviderIdentity {
    let name = user
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(user.login);
    ProviderIdentity {
        external_id: user.id.to_string(),
        name,
        email,
    }
}
