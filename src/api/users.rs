// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.
//!
//! Profile management belongs to a separate user service; only the reads
//! the auth flow needs are served here.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use tracing::{debug, error};
use uuid::Uuid;

use super::request_body;
use crate::auth::{Auth, AuthenticatedUser};
use crate::error::ApiError;
use crate::models::{GetUserRequest, User};
use crate::state::AppState;
use crate::storage::{IdentityRepository, RepositoryError};

async fn load_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    match state.identities.get_by_id(id).await {
        Ok(identity) => Ok(User::from(&identity)),
        Err(RepositoryError::NotFound) => Err(ApiError::not_found("user not found")),
        Err(e) => {
            error!(user_id = %id, error = %e, "failed to get user");
            Err(ApiError::internal("failed to get user"))
        }
    }
}

/// Get the account behind the caller's token.
#[utoipa::path(
    post,
    path = "/user.v1.UserService/GetCurrentUser",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = User),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Account no longer exists"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<User>, ApiError> {
    let id = Uuid::parse_str(&user.user_id).map_err(|_| {
        debug!(user_id = %user.user_id, "token subject is not a user id");
        ApiError::not_found("user not found")
    })?;
    load_user(&state, id).await.map(Json)
}

/// Get one user by id.
///
/// Admins and internal callers may read any account; other roles only
/// their own.
#[utoipa::path(
    post,
    path = "/user.v1.UserService/GetUser",
    tag = "Users",
    security(("bearer" = [])),
    request_body = GetUserRequest,
    responses(
        (status = 200, description = "User information", body = User),
        (status = 400, description = "Malformed id"),
        (status = 403, description = "Reading another user's account"),
        (status = 404, description = "No such user"),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Option<Extension<AuthenticatedUser>>,
    payload: Result<Json<GetUserRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let request = request_body(payload)?;
    let id = Uuid::parse_str(request.id.trim())
        .map_err(|_| ApiError::invalid_argument("id must be a UUID"))?;

    if let Some(Extension(caller)) = caller {
        if !caller.is_admin() && caller.user_id != id.to_string() {
            debug!(user_id = %caller.user_id, target = %id, "read of another account refused");
            return Err(ApiError::permission_denied("cannot read another user"));
        }
    }

    load_user(&state, id).await.map(Json)
}
