// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `auth.v1.AuthService` handlers. All are public methods.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::request_body;
use crate::auth::ClientInfo;
use crate::error::ApiError;
use crate::models::{
    GetOAuthCodeUrlRequest, GetOAuthCodeUrlResponse, GetUserTokenRequest, LoginByOAuthRequest,
    LoginByPasswordRequest, LoginSession, LogoutRequest, LogoutResponse, UserToken,
};
use crate::state::AppState;

/// Start an OAuth login.
///
/// Returns the provider authorization URL and the state nonce it carries.
/// The nonce is bound to the caller's user agent and IP address.
#[utoipa::path(
    post,
    path = "/auth.v1.AuthService/GetOAuthCodeURL",
    tag = "Auth",
    request_body = GetOAuthCodeUrlRequest,
    responses(
        (status = 200, description = "Authorization URL", body = GetOAuthCodeUrlResponse),
        (status = 400, description = "Missing or unsupported provider"),
    )
)]
pub async fn get_oauth_code_url(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    payload: Result<Json<GetOAuthCodeUrlRequest>, JsonRejection>,
) -> Result<Json<GetOAuthCodeUrlResponse>, ApiError> {
    let request = request_body(payload)?;
    state
        .auth
        .get_oauth_code_url(request, &client)
        .await
        .map(Json)
}

/// Complete an OAuth login with the provider's code and the state nonce.
#[utoipa::path(
    post,
    path = "/auth.v1.AuthService/LoginByOAuth",
    tag = "Auth",
    request_body = LoginByOAuthRequest,
    responses(
        (status = 200, description = "Session created", body = LoginSession),
        (status = 400, description = "Missing fields, unknown, expired or mismatched state"),
        (status = 412, description = "Email already used by another account"),
        (status = 500, description = "Provider exchange failed"),
    )
)]
pub async fn login_by_oauth(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    payload: Result<Json<LoginByOAuthRequest>, JsonRejection>,
) -> Result<Json<LoginSession>, ApiError> {
    let request = request_body(payload)?;
    state.auth.login_by_oauth(request, &client).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/auth.v1.AuthService/LoginByPassword",
    tag = "Auth",
    request_body = LoginByPasswordRequest,
    responses(
        (status = 200, description = "Session created", body = LoginSession),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Unknown email"),
        (status = 412, description = "Account has no password"),
    )
)]
pub async fn login_by_password(
    State(state): State<AppState>,
    payload: Result<Json<LoginByPasswordRequest>, JsonRejection>,
) -> Result<Json<LoginSession>, ApiError> {
    let request = request_body(payload)?;
    state.auth.login_by_password(request).await.map(Json)
}

/// Exchange a session id for a bearer token.
///
/// Also extends the session's sliding expiry. The token expires together
/// with the session.
#[utoipa::path(
    post,
    path = "/auth.v1.AuthService/GetUserToken",
    tag = "Auth",
    request_body = GetUserTokenRequest,
    responses(
        (status = 200, description = "Signed token", body = UserToken),
        (status = 400, description = "Missing session id"),
        (status = 401, description = "Unknown or expired session"),
    )
)]
pub async fn get_user_token(
    State(state): State<AppState>,
    payload: Result<Json<GetUserTokenRequest>, JsonRejection>,
) -> Result<Json<UserToken>, ApiError> {
    let request = request_body(payload)?;
    state.auth.get_user_token(request).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/auth.v1.AuthService/Logout",
    tag = "Auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Whether a session was revoked", body = LogoutResponse),
        (status = 400, description = "Missing session id"),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let request = request_body(payload)?;
    state.auth.logout(request).await.map(Json)
}
