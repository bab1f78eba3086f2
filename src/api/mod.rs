// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # RPC surface
//!
//! Unary JSON-over-HTTP RPC. Every method is a `POST` on its full method
//! name (see [`methods`]); the request path is what the auth gate sees.
//!
//! Health probes and the API docs sit outside the gate.

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::rejection::JsonRejection,
    middleware,
    routing::{get, post},
    BoxError, Json, Router,
};
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::auth_middleware,
    error::ApiError,
    models::{
        GetOAuthCodeUrlRequest, GetOAuthCodeUrlResponse, GetUserRequest, GetUserTokenRequest,
        LoginByOAuthRequest, LoginByPasswordRequest, LoginSession, LogoutRequest, LogoutResponse,
        User, UserToken,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod methods;
pub mod users;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let gate = state.gate.clone();

    let rpc_routes = Router::new()
        .route(methods::GET_OAUTH_CODE_URL, post(auth::get_oauth_code_url))
        .route(methods::LOGIN_BY_OAUTH, post(auth::login_by_oauth))
        .route(methods::LOGIN_BY_PASSWORD, post(auth::login_by_password))
        .route(methods::GET_USER_TOKEN, post(auth::get_user_token))
        .route(methods::LOGOUT, post(auth::logout))
        .route(methods::GET_CURRENT_USER, post(users::get_current_user))
        .route(methods::GET_USER, post(users::get_user))
        .fallback(unimplemented_method)
        .layer(middleware::from_fn_with_state(gate, auth_middleware))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    let app = Router::new()
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(rpc_routes);

    with_deadline(app, request_timeout)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Bound every call by `request_timeout`.
fn with_deadline(router: Router, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(request_failed))
            .timeout(request_timeout),
    )
}

/// Map middleware failures, chiefly an elapsed deadline, to an error body.
async fn request_failed(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        warn!("request deadline exceeded");
        ApiError::internal("request deadline exceeded")
    } else {
        warn!(error = %err, "request failed in middleware");
        ApiError::internal("request failed")
    }
}

/// Admitted calls to methods this server does not serve.
async fn unimplemented_method(uri: axum::http::Uri) -> ApiError {
    debug!(method = %uri.path(), "no handler for method");
    ApiError::not_found(format!("unknown method {}", uri.path()))
}

/// Unwrap a JSON request body, reporting decode failures as invalid arguments.
pub(crate) fn request_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::invalid_argument(rejection.body_text()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::get_oauth_code_url,
        auth::login_by_oauth,
        auth::login_by_password,
        auth::get_user_token,
        auth::logout,
        users::get_current_user,
        users::get_user,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            GetOAuthCodeUrlRequest,
            GetOAuthCodeUrlResponse,
            LoginByOAuthRequest,
            LoginByPasswordRequest,
            LoginSession,
            GetUserTokenRequest,
            UserToken,
            LogoutRequest,
            LogoutResponse,
            GetUserRequest,
            User,
            crate::auth::Role,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Login, sessions and token exchange"),
        (name = "Users", description = "User lookups"),
        (name = "Health", description = "Service health probes")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, TokenIssuer};
    use crate::config::AppConfig;
    use crate::providers::{testing::StubProvider, ProviderRegistry};
    use crate::storage::{MemoryIdentityRepository, MemoryKvStore};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const JWT_SECRET: &str = "router-test-secret";
    const INTERNAL: &str = "router-internal";

    struct TestApp {
        router: Router,
        identities: Arc<MemoryIdentityRepository>,
    }

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let mut all = vec![
            ("JWT_SECRET", JWT_SECRET),
            ("INTERNAL_TOKEN", INTERNAL),
        ];
        all.extend_from_slice(vars);
        AppConfig::from_lookup(|name| {
            all.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    fn app_with(config: AppConfig) -> TestApp {
        let identities = Arc::new(MemoryIdentityRepository::new());
        let providers = ProviderRegistry::new().with(
            "github",
            Arc::new(StubProvider::new("77", "Octo", "octo@example.com")),
        );
        let state = AppState::new(
            &config,
            Arc::new(MemoryKvStore::default()),
            identities.clone(),
            providers,
        );
        TestApp {
            router: router(state, config.request_timeout),
            identities,
        }
    }

    fn app() -> TestApp {
        app_with(config(&[]))
    }

    async fn call(app: &TestApp, method: &str, body: Value, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(method)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        app.router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn password_token(app: &TestApp, email: &str, password: &str) -> String {
        let login = call(
            app,
            methods::LOGIN_BY_PASSWORD,
            json!({"email": email, "password": password}),
            &[],
        )
        .await;
        assert_eq!(login.status(), StatusCode::OK);
        let session = json_body(login).await;

        let token = call(
            app,
            methods::GET_USER_TOKEN,
            json!({"session_id": session["id"]}),
            &[],
        )
        .await;
        assert_eq!(token.status(), StatusCode::OK);
        json_body(token).await["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn oauth_flow_over_http() {
        let app = app();

        let url = call(
            &app,
            methods::GET_OAUTH_CODE_URL,
            json!({"provider": "github"}),
            &[("user-agent", "browser/1.0"), ("x-forwarded-for", "203.0.113.5")],
        )
        .await;
        assert_eq!(url.status(), StatusCode::OK);
        let url = json_body(url).await;
        let state = url["state"].as_str().unwrap().to_string();
        assert_eq!(state.len(), 64);

        let hijack = call(
            &app,
            methods::LOGIN_BY_OAUTH,
            json!({"code": "validcode", "state": state}),
            &[("user-agent", "other/2.0"), ("x-forwarded-for", "203.0.113.5")],
        )
        .await;
        assert_eq!(hijack.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(hijack).await["code"], "invalid_argument");

        let url = json_body(
            call(
                &app,
                methods::GET_OAUTH_CODE_URL,
                json!({"provider": "github"}),
                &[("user-agent", "browser/1.0"), ("x-forwarded-for", "203.0.113.5")],
            )
            .await,
        )
        .await;
        let login = call(
            &app,
            methods::LOGIN_BY_OAUTH,
            json!({"code": "validcode", "state": url["state"]}),
            &[("user-agent", "browser/1.0"), ("x-forwarded-for", "203.0.113.5")],
        )
        .await;
        assert_eq!(login.status(), StatusCode::OK);
        let session = json_body(login).await;
        assert_eq!(session["id"].as_str().unwrap().len(), 64);

        let token = json_body(
            call(
                &app,
                methods::GET_USER_TOKEN,
                json!({"session_id": session["id"]}),
                &[],
            )
            .await,
        )
        .await;
        let bearer = format!("Bearer {}", token["token"].as_str().unwrap());

        let me = call(
            &app,
            methods::GET_CURRENT_USER,
            json!({}),
            &[("authorization", bearer.as_str())],
        )
        .await;
        assert_eq!(me.status(), StatusCode::OK);
        let me = json_body(me).await;
        assert_eq!(me["email"], "octo@example.com");
        assert_eq!(me["role"], "user");
    }

    #[tokio::test]
    async fn protected_method_requires_token() {
        let app = app();
        let response = call(&app, methods::GET_CURRENT_USER, json!({}), &[]).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "unauthenticated");
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn user_role_cannot_call_admin_methods() {
        let app = app();
        app.identities
            .seed_password_user("Ada", "ada@example.com", "pw", Role::User)
            .await
            .unwrap();
        let token = password_token(&app, "ada@example.com", "pw").await;
        let bearer = format!("Bearer {token}");

        let response = call(&app, methods::LIST_USERS, json!({}), &[("authorization", bearer.as_str())]).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "permission_denied");
    }

    #[tokio::test]
    async fn admin_reaches_unserved_methods_as_not_found() {
        let app = app();
        app.identities
            .seed_password_user("Root", "root@example.com", "pw", Role::Admin)
            .await
            .unwrap();
        let token = password_token(&app, "root@example.com", "pw").await;
        let bearer = format!("Bearer {token}");

        let response = call(&app, methods::LIST_USERS, json!({}), &[("authorization", bearer.as_str())]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_user_is_limited_to_self_for_users() {
        let app = app();
        let ada = app
            .identities
            .seed_password_user("Ada", "ada@example.com", "pw", Role::User)
            .await
            .unwrap();
        let bob = app
            .identities
            .seed_password_user("Bob", "bob@example.com", "pw", Role::User)
            .await
            .unwrap();
        let bearer = format!("Bearer {}", password_token(&app, "ada@example.com", "pw").await);

        let own = call(
            &app,
            methods::GET_USER,
            json!({"id": ada.id.to_string()}),
            &[("authorization", bearer.as_str())],
        )
        .await;
        assert_eq!(own.status(), StatusCode::OK);
        assert_eq!(json_body(own).await["name"], "Ada");

        let other = call(
            &app,
            methods::GET_USER,
            json!({"id": bob.id.to_string()}),
            &[("authorization", bearer.as_str())],
        )
        .await;
        assert_eq!(other.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_token_bypasses_policy() {
        let app = app();
        let bob = app
            .identities
            .seed_password_user("Bob", "bob@example.com", "pw", Role::User)
            .await
            .unwrap();
        let bearer = format!("Bearer {INTERNAL}");

        let response = call(
            &app,
            methods::GET_USER,
            json!({"id": bob.id.to_string()}),
            &[("authorization", bearer.as_str()), ("x-token-type", "internal")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let wrong = call(
            &app,
            methods::GET_USER,
            json!({"id": bob.id.to_string()}),
            &[("authorization", "Bearer nope"), ("x-token-type", "internal")],
        )
        .await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unavailable_policy_fails_closed() {
        let app = app_with(config(&[("RBAC_POLICY_PATH", "/nonexistent/policy.json")]));
        app.identities
            .seed_password_user("Root", "root@example.com", "pw", Role::Admin)
            .await
            .unwrap();
        let bearer = format!("Bearer {}", password_token(&app, "root@example.com", "pw").await);

        let response = call(&app, methods::GET_CURRENT_USER, json!({}), &[("authorization", bearer.as_str())]).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let ready = app
            .router
            .clone()
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unavailable_policy_with_fail_open_admits() {
        let app = app_with(config(&[
            ("RBAC_POLICY_PATH", "/nonexistent/policy.json"),
            ("RBAC_FAIL_OPEN", "true"),
        ]));
        app.identities
            .seed_password_user("Ada", "ada@example.com", "pw", Role::User)
            .await
            .unwrap();
        let bearer = format!("Bearer {}", password_token(&app, "ada@example.com", "pw").await);

        let response = call(&app, methods::GET_CURRENT_USER, json!({}), &[("authorization", bearer.as_str())]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_argument() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::post(methods::LOGIN_BY_PASSWORD)
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_argument");
    }

    #[tokio::test]
    async fn logout_over_http() {
        let app = app();
        app.identities
            .seed_password_user("Ada", "ada@example.com", "pw", Role::User)
            .await
            .unwrap();
        let session = json_body(
            call(
                &app,
                methods::LOGIN_BY_PASSWORD,
                json!({"email": "ada@example.com", "password": "pw"}),
                &[],
            )
            .await,
        )
        .await;

        let logout = call(&app, methods::LOGOUT, json!({"session_id": session["id"]}), &[]).await;
        assert_eq!(logout.status(), StatusCode::OK);
        assert_eq!(json_body(logout).await["revoked"], true);

        let token = call(
            &app,
            methods::GET_USER_TOKEN,
            json!({"session_id": session["id"]}),
            &[],
        )
        .await;
        assert_eq!(token.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn issued_token_verifies_with_configured_secret() {
        let app = app();
        let user = app
            .identities
            .seed_password_user("Ada", "ada@example.com", "pw", Role::User)
            .await
            .unwrap();
        let token = password_token(&app, "ada@example.com", "pw").await;
        let claims = TokenIssuer::new(JWT_SECRET.as_bytes()).verify(&token).unwrap();
        assert_eq!(claims.user_id, user.id.to_string());
    }

    #[tokio::test]
    async fn health_and_docs_bypass_gate() {
        let app = app();
        for path in ["/health", "/health/live", "/health/ready", "/api-doc/openapi.json"] {
            let response = app
                .router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_returns_internal_error_body() {
        let slow = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                "late"
            }),
        );
        let app = with_deadline(slow, Duration::from_secs(1));

        let response = app
            .oneshot(Request::post("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"code": "internal", "error": "request deadline exceeded"})
        );
    }

    #[tokio::test]
    async fn other_middleware_failures_are_internal() {
        let err = request_failed(BoxError::from("boom")).await;
        assert_eq!(err.code, crate::error::Code::Internal);
        assert_eq!(err.message, "request failed");
    }
}
