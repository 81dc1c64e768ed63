// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

use std::time::Duration;

use axum::{
    http::{
        header::{
            AUTHORIZATION, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, PRAGMA,
            WWW_AUTHENTICATE,
        },
        HeaderMap, Method,
    },
    middleware::{from_fn, from_fn_with_state},
    routing::{any, delete, get, post},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{authenticate, require_active_session, require_authenticated_user},
    error::ApiError,
    proxy,
    state::AppState,
    users::{SignInCredentials, User},
    version::{ensure_version_supported, API_VERSION_HEADER},
};

pub mod health;
pub mod sessions;
pub mod users;

/// Mount point of the gateway's own collections.
pub const GATEWAY_PREFIX: &str = "/api/v1/gateway";

const JSON_CONTENT_TYPE: &str = "application/json";

const CORS_MAX_AGE: Duration = Duration::from_secs(600);

pub fn router(state: AppState) -> Router {
    let versioned = from_fn_with_state(state.clone(), ensure_version_supported);

    let users = Router::new()
        .route("/users", post(users::create_user))
        .route_layer(versioned.clone())
        .merge(
            Router::new()
                .route("/users/{uuid}", get(users::get_user).delete(users::delete_user))
                .route_layer(versioned.clone())
                .route_layer(from_fn(require_active_session))
                .route_layer(from_fn(require_authenticated_user)),
        );

    let sessions = Router::new()
        .route("/sessions", post(sessions::create_session))
        .route_layer(versioned.clone())
        .merge(
            Router::new()
                .route("/sessions/{session}", delete(sessions::delete_session))
                .route_layer(versioned)
                .route_layer(from_fn(require_active_session)),
        );

    let gateway = Router::new()
        .merge(users)
        .merge(sessions)
        .route("/health", get(health::readiness))
        .layer(SetResponseHeaderLayer::overriding(
            API_VERSION_HEADER,
            state.versions.header_value(),
        ));

    let app = Router::new()
        .nest(GATEWAY_PREFIX, gateway)
        .route("/api/aqrest/{*rest}", any(proxy::aqrest))
        .route("/health/live", get(health::liveness))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state.clone());

    let app = if state.environment.is_development() {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    };

    app.merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, API_VERSION_HEADER])
        .expose_headers([
            AUTHORIZATION,
            API_VERSION_HEADER,
            LOCATION,
            CACHE_CONTROL,
            PRAGMA,
            CONTENT_LENGTH,
            WWW_AUTHENTICATE,
        ])
        .max_age(CORS_MAX_AGE)
}

async fn not_found() -> ApiError {
    ApiError::not_found("resource not found").with_context("no route matches the request")
}

/// 415 unless the request declares a JSON body.
pub(crate) fn ensure_json(headers: &HeaderMap) -> Result<(), ApiError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE));
    if is_json {
        return Ok(());
    }
    Err(ApiError::unsupported_media_type(
        "Content-Type header is not application/json",
    )
    .with_context("checking request content type"))
}

pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError::bad_request("issue decoding request body into json object")
            .with_context("decoding request body")
            .with_detail(e)
    })
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::create_user,
        users::get_user,
        users::delete_user,
        sessions::create_session,
        sessions::delete_session,
        health::readiness,
        health::liveness
    ),
    components(
        schemas(
            User,
            SignInCredentials,
            users::NewUserRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Users", description = "Account sign-up and management"),
        (name = "Sessions", description = "Sign-in, anonymous sessions and sign-out"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::session::SessionToken;

    async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(path: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn with_bearer(method: &str, path: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn bearer_of(response: &Response<Body>) -> String {
        response.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .strip_prefix("Bearer ")
            .unwrap()
            .to_string()
    }

    fn sign_up_body(username: &str) -> Value {
        json!({
            "username": username,
            "fullName": "Ada Lovelace",
            "displayName": "ada",
            "password": "correct horse battery"
        })
    }

    async fn sign_up(app: &Router, username: &str) -> (String, Value) {
        let response = send(app, post_json("/api/v1/gateway/users", sign_up_body(username), None)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let token = bearer_of(&response);
        (token, body_json(response).await)
    }

    #[tokio::test]
    async fn sign_up_starts_authenticated_session() {
        let state = AppState::for_tests();
        let app = router(state.clone());

        let response = send(&app, post_json("/api/v1/gateway/users", sign_up_body("ada"), None)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[API_VERSION_HEADER], "0.1.0");
        let token = bearer_of(&response);
        let location = response.headers()[LOCATION].to_str().unwrap().to_string();
        let user = body_json(response).await;
        assert_eq!(user["username"], "ada");
        assert!(location.ends_with(&format!("/api/v1/gateway/users/{}", user["uuid"].as_str().unwrap())));

        let token = SessionToken::validate(&token, &state.signing_key).unwrap();
        let record = state.sessions.get(&token).await.unwrap();
        assert!(record.is_authenticated());
        assert_eq!(record.user().unwrap().username, "ada");
    }

    #[tokio::test]
    async fn ended_session_token_is_rejected() {
        let app = router(AppState::for_tests());
        let (token, user) = sign_up(&app, "ada").await;

        let response = send(&app, with_bearer("DELETE", "/api/v1/gateway/sessions/this", &token)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let path = format!("/api/v1/gateway/users/{}", user["uuid"].as_str().unwrap());
        let response = send(&app, with_bearer("GET", &path, &token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.contains(r#"error="invalid_token""#));
    }

    #[tokio::test]
    async fn own_profile_is_readable() {
        let app = router(AppState::for_tests());
        let (token, user) = sign_up(&app, "ada").await;
        let path = format!("/api/v1/gateway/users/{}", user["uuid"].as_str().unwrap());

        let response = send(&app, with_bearer("GET", &path, &token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["fullName"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn other_profile_is_forbidden() {
        let app = router(AppState::for_tests());
        let (token, _) = sign_up(&app, "ada").await;
        let (_, other) = sign_up(&app, "grace").await;
        let path = format!("/api/v1/gateway/users/{}", other["uuid"].as_str().unwrap());

        let response = send(&app, with_bearer("GET", &path, &token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn taken_username_conflicts() {
        let app = router(AppState::for_tests());
        sign_up(&app, "ada").await;
        let response = send(&app, post_json("/api/v1/gateway/users", sign_up_body("ada"), None)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn sign_up_requires_json() {
        let app = router(AppState::for_tests());
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/gateway/users")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("username=ada"))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let app = router(AppState::for_tests());
        let mut body = sign_up_body("ada");
        body["password"] = json!("short");
        let response = send(&app, post_json("/api/v1/gateway/users", body, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["clientError"], true);
        assert!(body["message"].as_str().unwrap().starts_with("the provided password"));
    }

    #[tokio::test]
    async fn anonymous_session_then_sign_in_keeps_token() {
        let state = AppState::for_tests();
        let app = router(state.clone());
        sign_up(&app, "ada").await;

        let response = send(&app, post_json("/api/v1/gateway/sessions", json!({}), None)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[PRAGMA], "no-cache");
        let anonymous = bearer_of(&response);
        assert_eq!(body_json(response).await["uuid"], Uuid::nil().to_string());

        let credentials = json!({"username": "ada", "password": "correct horse battery"});
        let response = send(&app, post_json("/api/v1/gateway/sessions", credentials, Some(&anonymous))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(bearer_of(&response), anonymous);

        let token = SessionToken::validate(&anonymous, &state.signing_key).unwrap();
        assert!(state.sessions.get(&token).await.unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn wrong_password_is_forbidden() {
        let app = router(AppState::for_tests());
        sign_up(&app, "ada").await;

        let credentials = json!({"username": "ada", "password": "not the password"});
        let response = send(&app, post_json("/api/v1/gateway/sessions", credentials, None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let credentials = json!({"username": "nobody", "password": "not the password"});
        let response = send(&app, post_json("/api/v1/gateway/sessions", credentials, None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let credentials = json!({"username": "ada", "password": "short"});
        let response = send(&app, post_json("/api/v1/gateway/sessions", credentials, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn owner_can_end_another_of_their_sessions() {
        let app = router(AppState::for_tests());
        let (first, _) = sign_up(&app, "ada").await;

        let credentials = json!({"username": "ada", "password": "correct horse battery"});
        let response = send(&app, post_json("/api/v1/gateway/sessions", credentials, None)).await;
        let location = response.headers()[LOCATION].to_str().unwrap().to_string();
        let second_uuid = location.rsplit('/').next().unwrap().to_string();

        let path = format!("/api/v1/gateway/sessions/{second_uuid}");
        let response = send(&app, with_bearer("DELETE", &path, &first)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, with_bearer("DELETE", &path, &first)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn anonymous_caller_cannot_end_other_sessions() {
        let app = router(AppState::for_tests());
        let response = send(&app, post_json("/api/v1/gateway/sessions", json!({"username": ""}), None)).await;
        let token = bearer_of(&response);

        let path = format!("/api/v1/gateway/sessions/{}", Uuid::new_v4());
        let response = send(&app, with_bearer("DELETE", &path, &token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn ending_session_requires_one() {
        let app = router(AppState::for_tests());
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/v1/gateway/sessions/this")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let app = router(AppState::for_tests());
        let mut request = post_json("/api/v1/gateway/sessions", json!({}), None);
        request
            .headers_mut()
            .insert(API_VERSION_HEADER, "2.0.0".parse().unwrap());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("supported versions: 0.1.0"));

        let request = post_json("/api/v1/gateway/sessions?apiVersion=0.1", json!({}), None);
        assert_eq!(send(&app, request).await.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn readiness_follows_monitor() {
        let state = AppState::for_tests();
        let app = router(state.clone());
        let request = || Request::builder().uri("/api/v1/gateway/health").body(Body::empty()).unwrap();

        assert_eq!(send(&app, request()).await.status(), StatusCode::OK);
        state.readiness.set(false);
        let response = send(&app, request()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "not ready");
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let app = router(AppState::for_tests());
        let request = Request::builder().uri("/nowhere").body(Body::empty()).unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["clientError"], true);
    }

    #[tokio::test]
    async fn preflight_is_answered_by_cors() {
        let app = router(AppState::for_tests());
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/gateway/users")
            .header("origin", "https://app.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-max-age"], "600");
    }

    #[tokio::test]
    async fn large_anonymous_form_reaches_backend() {
        use std::{sync::Arc, time::Duration};

        use crate::proxy::ServiceProxy;
        use crate::session::{MemorySessionStore, SigningKey};
        use crate::users::InMemoryUserStore;

        let backend = Router::new().route(
            "/api/aqrest/upload",
            post(|request: axum::extract::Request| async move {
                let body = axum::body::to_bytes(request.into_body(), usize::MAX)
                    .await
                    .unwrap();
                body.len().to_string()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, backend).await.unwrap() });

        let state = AppState::new(
            SigningKey::new("router form test").unwrap(),
            Arc::new(MemorySessionStore::new(Duration::from_secs(60))),
            Arc::new(InMemoryUserStore::new()),
            ServiceProxy::new(&format!("http://{addr}")).unwrap(),
        );
        let app = router(state);

        let body = format!("data={}", "a".repeat(70 * 1024));
        let length = body.len();
        let request = Request::builder()
            .method("POST")
            .uri("/api/aqrest/upload")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CONTENT_LENGTH, length)
            .body(Body::from(body))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], length.to_string().as_bytes());
    }
}
