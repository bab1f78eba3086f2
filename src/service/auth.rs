// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login use cases.
//!
//! [`AuthOrchestrator`] is built once at startup and owns every collaborator
//! the login flows need. Failures are returned as [`ApiError`] with the
//! caller-facing code; store, signing and provider failures are logged here
//! with detail and surfaced as `internal` with a short message.
//!
//! No flow creates a session until every earlier step succeeded. The OAuth
//! state is consumed first, so a callback that fails later still burns it.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::password;
use crate::auth::random::redact;
use crate::auth::TokenIssuer;
use crate::error::ApiError;
use crate::models::{
    ClientMetadata, GetOAuthCodeUrlRequest, GetOAuthCodeUrlResponse, GetUserTokenRequest,
    Identity, LoginByOAuthRequest, LoginByPasswordRequest, LoginSession, LogoutRequest,
    LogoutResponse, UserToken,
};
use crate::providers::{ProviderIdentity, ProviderRegistry};
use crate::storage::{IdentityRepository, NonceStore, RepositoryError, SessionError, SessionStore};

pub struct AuthOrchestrator {
    nonces: NonceStore,
    sessions: SessionStore,
    tokens: Arc<TokenIssuer>,
    identities: Arc<dyn IdentityRepository>,
    providers: ProviderRegistry,
}

fn internal(context: &'static str, err: impl std::fmt::Display) -> ApiError {
    error!(error = %err, "{context}");
    ApiError::internal(context)
}

impl AuthOrchestrator {
    pub fn new(
        nonces: NonceStore,
        sessions: SessionStore,
        tokens: Arc<TokenIssuer>,
        identities: Arc<dyn IdentityRepository>,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            nonces,
            sessions,
            tokens,
            identities,
            providers,
        }
    }

    /// Hand out a provider authorization URL bound to a fresh state nonce.
    pub async fn get_oauth_code_url(
        &self,
        request: GetOAuthCodeUrlRequest,
        client: &ClientMetadata,
    ) -> Result<GetOAuthCodeUrlResponse, ApiError> {
        if request.provider.is_empty() {
            return Err(ApiError::invalid_argument("provider is required"));
        }
        let provider = self.providers.get(&request.provider).ok_or_else(|| {
            warn!(provider = %request.provider, "oauth code url for unsupported provider");
            ApiError::invalid_argument(format!("unsupported provider: {}", request.provider))
        })?;

        let redirect_url = request
            .redirect_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| provider.default_redirect_url().to_string());

        let state = self
            .nonces
            .issue(&request.provider, Some(redirect_url.as_str()), client)
            .await
            .map_err(|e| internal("failed to store state", e))?;

        info!(
            provider = %request.provider,
            %redirect_url,
            state_prefix = redact(&state),
            ip_address = client.ip_address.as_deref().unwrap_or(""),
            "oauth code url generated"
        );

        Ok(GetOAuthCodeUrlResponse {
            url: provider.authorize_url(&state, &redirect_url),
            state,
        })
    }

    /// Complete the OAuth callback and start a session.
    pub async fn login_by_oauth(
        &self,
        request: LoginByOAuthRequest,
        client: &ClientMetadata,
    ) -> Result<LoginSession, ApiError> {
        if request.code.is_empty() || request.state.is_empty() {
            warn!(
                has_code = !request.code.is_empty(),
                has_state = !request.state.is_empty(),
                "oauth login missing fields"
            );
            return Err(ApiError::invalid_argument("code and state are required"));
        }

        let record = self
            .nonces
            .consume(&request.state)
            .await
            .map_err(|e| internal("failed to read state", e))?
            .ok_or_else(|| {
                warn!(state_prefix = redact(&request.state), "unknown or reused oauth state");
                ApiError::invalid_argument("invalid or expired state")
            })?;

        record.validate(client, Utc::now()).map_err(|rejection| {
            warn!(
                state_prefix = redact(&request.state),
                ip_address = client.ip_address.as_deref().unwrap_or(""),
                reason = %rejection,
                "oauth state rejected"
            );
            ApiError::invalid_argument(rejection.to_string())
        })?;

        let provider = self.providers.get(&record.provider).ok_or_else(|| {
            error!(provider = %record.provider, "state references unsupported provider");
            ApiError::invalid_argument(format!("unsupported provider: {}", record.provider))
        })?;

        let redirect_url = record
            .redirect_url
            .clone()
            .unwrap_or_else(|| provider.default_redirect_url().to_string());

        let access_token = provider
            .exchange_code(&request.code, &redirect_url)
            .await
            .map_err(|e| internal("failed to exchange code for token", e))?;
        debug!(provider = %record.provider, "oauth code exchanged");

        let profile = provider
            .fetch_identity(&access_token)
            .await
            .map_err(|e| internal("failed to get user info", e))?;

        let identity = self.upsert_oauth_identity(&record.provider, profile).await?;
        let session = self.start_session(&identity).await?;

        info!(
            user_id = %identity.id,
            provider = %record.provider,
            session_prefix = redact(&session.id),
            "oauth login completed"
        );
        Ok(session)
    }

    /// Verify local credentials and start a session.
    pub async fn login_by_password(
        &self,
        request: LoginByPasswordRequest,
    ) -> Result<LoginSession, ApiError> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(ApiError::invalid_argument("email and password are required"));
        }

        let mut identity = match self.identities.get_by_email(&request.email).await {
            Ok(identity) => identity,
            Err(RepositoryError::NotFound) => {
                warn!(email = %request.email, "password login for unknown email");
                return Err(ApiError::not_found("invalid credentials"));
            }
            Err(e) => return Err(internal("failed to query user", e)),
        };

        if !identity.has_password() {
            warn!(user_id = %identity.id, "password login for oauth-only account");
            return Err(ApiError::failed_precondition(
                "password login not available for this account",
            ));
        }
        let hash = identity.hashed_password.as_deref().unwrap_or_default();

        let valid = password::verify_password(&request.password, hash)
            .map_err(|e| internal("failed to verify password", e))?;
        if !valid {
            warn!(user_id = %identity.id, "password login with wrong password");
            return Err(ApiError::unauthenticated("invalid credentials"));
        }

        identity.last_login_at = Some(Utc::now());
        let identity = self
            .identities
            .update(identity)
            .await
            .map_err(|e| internal("failed to update user", e))?;

        let session = self.start_session(&identity).await?;
        info!(
            user_id = %identity.id,
            session_prefix = redact(&session.id),
            "password login completed"
        );
        Ok(session)
    }

    /// Exchange a session for a token expiring with the session.
    ///
    /// Resolving the session slides its expiry forward first; the token's
    /// `exp` is the refreshed expiry, truncated to whole seconds.
    pub async fn get_user_token(&self, request: GetUserTokenRequest) -> Result<UserToken, ApiError> {
        let session_id = request.session_id;
        if session_id.is_empty() {
            return Err(ApiError::invalid_argument("session_id is required"));
        }

        let user_id = self
            .sessions
            .resolve(&session_id)
            .await
            .map_err(|e| session_error(&session_id, e))?;
        let session_expires_at = self
            .sessions
            .remaining_expiry(&session_id)
            .await
            .map_err(|e| session_error(&session_id, e))?;

        let user_id = Uuid::parse_str(&user_id)
            .map_err(|e| internal("session holds an invalid user id", e))?;
        let identity = match self.identities.get_by_id(user_id).await {
            Ok(identity) => identity,
            Err(RepositoryError::NotFound) => {
                warn!(%user_id, "session refers to a missing user");
                return Err(ApiError::unauthenticated("invalid or expired session"));
            }
            Err(e) => return Err(internal("failed to get user", e)),
        };

        let expires_at = session_expires_at.trunc_subsecs(0);
        let token = self
            .tokens
            .issue(&identity.id.to_string(), identity.role, expires_at)
            .map_err(|e| internal("failed to generate token", e))?;

        info!(
            user_id = %identity.id,
            role = %identity.role,
            session_prefix = redact(&session_id),
            token_expires_at = %expires_at,
            "user token issued"
        );
        Ok(UserToken { token, expires_at })
    }

    /// End a session. Tokens already issued stay valid until their `exp`.
    pub async fn logout(&self, request: LogoutRequest) -> Result<LogoutResponse, ApiError> {
        if request.session_id.is_empty() {
            return Err(ApiError::invalid_argument("session_id is required"));
        }
        let revoked = self
            .sessions
            .revoke(&request.session_id)
            .await
            .map_err(|e| internal("failed to revoke session", e))?;
        Ok(LogoutResponse { revoked })
    }

    async fn upsert_oauth_identity(
        &self,
        provider: &str,
        profile: ProviderIdentity,
    ) -> Result<Identity, ApiError> {
        let now = Utc::now();
        match self
            .identities
            .get_by_external_id(provider, &profile.external_id)
            .await
        {
            Ok(mut existing) => {
                existing.last_login_at = Some(now);
                self.identities
                    .update(existing)
                    .await
                    .map_err(|e| internal("failed to update user", e))
            }
            Err(RepositoryError::NotFound) => {
                let mut identity = Identity::new(profile.name, profile.email);
                identity.provider = Some(provider.to_string());
                identity.external_id = Some(profile.external_id);
                identity.last_login_at = Some(now);

                match self.identities.create(identity).await {
                    Ok(created) => {
                        info!(user_id = %created.id, provider, "new user created");
                        Ok(created)
                    }
                    Err(RepositoryError::Conflict(what)) => {
                        warn!(provider, conflict = %what, "oauth identity collides with existing account");
                        Err(ApiError::failed_precondition(
                            "an account with this email already exists",
                        ))
                    }
                    Err(e) => Err(internal("failed to create user", e)),
                }
            }
            Err(e) => Err(internal("failed to query user", e)),
        }
    }

    async fn start_session(&self, identity: &Identity) -> Result<LoginSession, ApiError> {
        let session_id = self
            .sessions
            .create(&identity.id.to_string())
            .await
            .map_err(|e| internal("failed to create session", e))?;
        let expires_at: DateTime<Utc> = self
            .sessions
            .remaining_expiry(&session_id)
            .await
            .map_err(|e| internal("failed to get session expiration", e))?;
        Ok(LoginSession {
            id: session_id,
            expires_at,
        })
    }
}

fn session_error(session_id: &str, err: SessionError) -> ApiError {
    match err {
        SessionError::NotFound => {
            warn!(session_prefix = redact(session_id), "invalid or expired session");
            ApiError::unauthenticated("invalid or expired session")
        }
        other => internal("failed to read session", other),
    }
}
