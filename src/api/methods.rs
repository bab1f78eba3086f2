// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Full method names of the RPC surface.
//!
//! Each method is served as `POST <full method name>`; the same string is
//! what the gate classifies and the policy table matches.

pub const GET_OAUTH_CODE_URL: &str = "/auth.v1.AuthService/GetOAuthCodeURL";
pub const LOGIN_BY_OAUTH: &str = "/auth.v1.AuthService/LoginByOAuth";
pub const LOGIN_BY_PASSWORD: &str = "/auth.v1.AuthService/LoginByPassword";
pub const GET_USER_TOKEN: &str = "/auth.v1.AuthService/GetUserToken";
pub const LOGOUT: &str = "/auth.v1.AuthService/Logout";

pub const GET_CURRENT_USER: &str = "/user.v1.UserService/GetCurrentUser";
pub const GET_USER: &str = "/user.v1.UserService/GetUser";
pub const CREATE_USER: &str = "/user.v1.UserService/CreateUser";
pub const UPDATE_USER: &str = "/user.v1.UserService/UpdateUser";
pub const DELETE_USER: &str = "/user.v1.UserService/DeleteUser";
pub const LIST_USERS: &str = "/user.v1.UserService/ListUsers";

/// Methods callable without a credential.
pub const PUBLIC: [&str; 5] = [
    GET_OAUTH_CODE_URL,
    LOGIN_BY_OAUTH,
    LOGIN_BY_PASSWORD,
    GET_USER_TOKEN,
    LOGOUT,
];

/// Methods that pass through the role policy.
pub const PROTECTED: [&str; 6] = [
    GET_CURRENT_USER,
    GET_USER,
    CREATE_USER,
    UPDATE_USER,
    DELETE_USER,
    LIST_USERS,
];
