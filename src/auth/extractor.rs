// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the authenticated caller and client metadata.
//!
//! ```rust,ignore
//! async fn get_current_user(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser, set by the gate
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use super::{AuthError, AuthenticatedUser};
use crate::models::ClientMetadata;

/// The caller admitted by the gate with a user token.
///
/// Internal-typed calls carry no user and are rejected by this extractor.
pub struct Auth(pub AuthenticatedUser);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// User agent and client IP of the request.
///
/// The IP comes from the peer socket address when the server was started
/// with connect info, otherwise from the first `x-forwarded-for` entry,
/// then `x-real-ip`.
pub struct ClientInfo(pub ClientMetadata);

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = header_value(&parts.headers, USER_AGENT.as_str());
        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .or_else(|| forwarded_ip(&parts.headers));

        Ok(ClientInfo(ClientMetadata {
            user_agent,
            ip_address,
        }))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|list| {
            list.split(',')
                .next()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        })
        .or_else(|| header_value(headers, "x-real-ip"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use axum::http::Request;

    fn request_parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_reads_user_from_extensions() {
        let mut parts = request_parts(Request::builder().uri("/x"));
        parts.extensions.insert(AuthenticatedUser {
            user_id: "user-1".to_string(),
            role: Role::Admin,
        });

        let Auth(user) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, "user-1");
    }

    #[tokio::test]
    async fn auth_without_user_is_rejected() {
        let mut parts = request_parts(Request::builder().uri("/x"));
        let result = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn client_info_prefers_peer_address() {
        let mut parts = request_parts(
            Request::builder()
                .header("user-agent", "test-agent/1.0")
                .header("x-forwarded-for", "203.0.113.9"),
        );
        parts
            .extensions
            .insert(ConnectInfo("198.51.100.7:5555".parse::<SocketAddr>().unwrap()));

        let ClientInfo(client) = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(client.ip_address.as_deref(), Some("198.51.100.7"));
    }

    #[tokio::test]
    async fn client_info_falls_back_to_forwarding_headers() {
        let mut parts = request_parts(
            Request::builder().header("x-forwarded-for", " 203.0.113.9 , 10.0.0.1"),
        );
        let ClientInfo(client) = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(client.user_agent, None);

        let mut parts = request_parts(Request::builder().header("x-real-ip", "192.0.2.4"));
        let ClientInfo(client) = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client.ip_address.as_deref(), Some("192.0.2.4"));
    }

    #[tokio::test]
    async fn client_info_without_any_source_is_empty() {
        let mut parts = request_parts(Request::builder());
        let ClientInfo(client) = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(client, ClientMetadata::default());
    }
}
