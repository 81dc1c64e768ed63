// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Axum extractors over the request's [`AuthContext`].
//!
//! ```rust,ignore
//! async fn my_handler(Authenticated { user, session }: Authenticated) -> impl IntoResponse {
//!     // user is the signed-in User, session the ActiveSession it came from
//! }
//! ```
//!
//! A request that never passed through the authentication middleware carries
//! no context and is treated as anonymous.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::gates::{no_session, unauthorized};
use super::AuthContext;
use crate::error::ApiError;
use crate::session::ActiveSession;
use crate::users::User;

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Signed-in user and the session they presented.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub session: ActiveSession,
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(context) = AuthContext::from_request_parts(parts, state).await;
        match (context.current_user(), context.current_session()) {
            (Some(user), Some(session)) => Ok(Authenticated {
                user: user.clone(),
                session: session.clone(),
            }),
            _ => Err(unauthorized(context.failure())),
        }
    }
}

/// Any active session, anonymous or authenticated.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub ActiveSession);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(context) = AuthContext::from_request_parts(parts, state).await;
        context
            .current_session()
            .cloned()
            .map(CurrentSession)
            .ok_or_else(no_session)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};
    use uuid::Uuid;

    use super::*;
    use crate::auth::AuthFailure;
    use crate::session::{SessionRecord, SessionToken, SigningKey};

    fn parts_with(context: Option<AuthContext>) -> Parts {
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        if let Some(context) = context {
            parts.extensions.insert(context);
        }
        parts
    }

    fn active(record: SessionRecord) -> AuthContext {
        let token = SessionToken::generate(&SigningKey::new("extractor").unwrap()).unwrap();
        AuthContext::active(ActiveSession { token, record })
    }

    #[tokio::test]
    async fn context_defaults_to_anonymous() {
        let mut parts = parts_with(None);
        let Ok(context) = AuthContext::from_request_parts(&mut parts, &()).await;
        assert!(!context.is_session_active());
    }

    #[tokio::test]
    async fn authenticated_requires_user() {
        let mut parts = parts_with(Some(active(SessionRecord::anonymous(Uuid::new_v4()))));
        let err = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let mut parts = parts_with(Some(AuthContext::failed(AuthFailure::InvalidToken)));
        assert!(Authenticated::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn authenticated_extracts_user() {
        let user = User {
            uuid: Uuid::new_v4(),
            username: "ada".into(),
            full_name: "Ada".into(),
            display_name: "ada".into(),
        };
        let mut parts = parts_with(Some(active(SessionRecord::authenticated(
            Uuid::new_v4(),
            user.clone(),
        ))));
        let extracted = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(extracted.user, user);
    }

    #[tokio::test]
    async fn current_session_requires_session() {
        let mut parts = parts_with(None);
        let err = CurrentSession::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
