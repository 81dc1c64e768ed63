// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Authorization gates.
//!
//! Each gate is its own middleware so routes can require either, both or
//! neither:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/users/{uuid}", delete(delete_user))
//!     .route_layer(middleware::from_fn(require_active_session))
//!     .route_layer(middleware::from_fn(require_authenticated_user));
//! ```

use axum::{
    extract::Request,
    http::header::WWW_AUTHENTICATE,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{challenge, AuthContext, AuthFailure};
use crate::error::ApiError;

/// 401 with a bearer challenge naming `failure`, if known.
pub fn unauthorized(failure: Option<AuthFailure>) -> ApiError {
    ApiError::unauthorized("user not authorized, please start a new session")
        .with_context("request to access authenticated resource, but user is not authenticated")
        .with_header(WWW_AUTHENTICATE, challenge(failure))
}

pub fn no_session() -> ApiError {
    ApiError::forbidden("not in a session")
        .with_context("request to access resource requiring an active session")
}

/// Reject requests without an authenticated user.
pub async fn require_authenticated_user(request: Request, next: Next) -> Response {
    let context = request.extensions().get::<AuthContext>();
    if context.is_some_and(AuthContext::is_authenticated) {
        return next.run(request).await;
    }
    unauthorized(context.and_then(AuthContext::failure)).into_response()
}

/// Reject requests without an active session, anonymous or not.
pub async fn require_active_session(request: Request, next: Next) -> Response {
    let active = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(AuthContext::is_session_active);
    if active {
        return next.run(request).await;
    }
    no_session().into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::StatusCode,
        middleware::from_fn,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::session::{ActiveSession, SessionRecord, SessionToken, SigningKey};
    use crate::users::User;

    fn app(context: Option<AuthContext>) -> Router {
        let gated = Router::new()
            .route("/user", get(|| async { "user" }))
            .route_layer(from_fn(require_authenticated_user))
            .merge(
                Router::new()
                    .route("/session", get(|| async { "session" }))
                    .route_layer(from_fn(require_active_session)),
            );
        match context {
            Some(context) => gated.layer(Extension(context)),
            None => gated,
        }
    }

    fn active(record: SessionRecord) -> AuthContext {
        let token = SessionToken::generate(&SigningKey::new("gates").unwrap()).unwrap();
        AuthContext::active(ActiveSession { token, record })
    }

    async fn call(app: Router, path: &str) -> Response {
        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_gets_challenge() {
        let response = call(app(Some(AuthContext::anonymous())), "/user").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], r#"Bearer realm="/api/""#);
    }

    #[tokio::test]
    async fn invalid_token_reason_in_challenge() {
        let response = call(app(Some(AuthContext::failed(AuthFailure::InvalidToken))), "/user").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.contains(r#"error="invalid_token""#));
    }

    #[tokio::test]
    async fn missing_context_fails_closed() {
        assert_eq!(call(app(None), "/user").await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(app(None), "/session").await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn anonymous_session_passes_session_gate_only() {
        let ctx = active(SessionRecord::anonymous(Uuid::new_v4()));
        assert_eq!(call(app(Some(ctx.clone())), "/session").await.status(), StatusCode::OK);
        assert_eq!(call(app(Some(ctx)), "/user").await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_session_passes_both() {
        let user = User {
            uuid: Uuid::new_v4(),
            username: "ada".into(),
            full_name: "Ada".into(),
            display_name: "ada".into(),
        };
        let ctx = active(SessionRecord::authenticated(Uuid::new_v4(), user));
        assert_eq!(call(app(Some(ctx.clone())), "/user").await.status(), StatusCode::OK);
        assert_eq!(call(app(Some(ctx)), "/session").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn no_session_is_forbidden() {
        let response = call(app(Some(AuthContext::anonymous())), "/session").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
