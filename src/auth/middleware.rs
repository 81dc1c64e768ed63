// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Authentication middleware for Axum.
//!
//! Evaluates the request's bearer token once and attaches the outcome as an
//! [`AuthContext`]. It never rejects a request for failed authentication;
//! the gates in [`super::gates`] decide what a route requires.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .nest("/api", api_routes)
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, Uri,
    },
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

use super::{AuthContext, AuthFailure};
use crate::session::{ActiveSession, SessionStore, SessionStoreError, SessionToken, SigningKey};
use crate::state::AppState;

/// Query or form parameter carrying the token when no header is sent
/// (RFC 6750 §2.2, §2.3).
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

const BEARER_SCHEME: &str = "bearer";

/// Largest form body buffered to look for the token.
const MAX_FORM_BODY: usize = 64 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What the request presented as a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Absent,
    /// Something other than a `Bearer` credential.
    MissingScheme,
    Token(String),
}

/// Split `Bearer <token>`; the scheme is case-insensitive.
fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn header_credential(headers: &HeaderMap) -> Option<Credential> {
    let value = headers.get(AUTHORIZATION)?;
    let Ok(value) = value.to_str() else {
        return Some(Credential::MissingScheme);
    };
    if value.trim().is_empty() {
        return None;
    }
    Some(match strip_bearer(value) {
        Some(token) => Credential::Token(token.to_string()),
        None => Credential::MissingScheme,
    })
}

/// Parameter values are the bare token; a `Bearer ` prefix is tolerated.
fn param_credential(encoded: &[u8]) -> Option<Credential> {
    let value = url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())?;
    let token = strip_bearer(&value).map(str::to_string).unwrap_or(value);
    Some(Credential::Token(token))
}

fn query_credential(uri: &Uri) -> Option<Credential> {
    uri.query().and_then(|query| param_credential(query.as_bytes()))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with(FORM_CONTENT_TYPE))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Find the credential in header, then query, then form body.
///
/// Only form bodies that declare a length of at most [`MAX_FORM_BODY`] are
/// searched; anything else passes through untouched with no credential. A
/// searched body is buffered and the request rebuilt around the bytes so
/// handlers still see it. Nothing here rejects the request.
pub async fn extract_credential(request: Request) -> (Credential, Request) {
    if let Some(credential) = header_credential(request.headers()) {
        return (credential, request);
    }
    if let Some(credential) = query_credential(request.uri()) {
        return (credential, request);
    }
    if !is_form(request.headers()) {
        return (Credential::Absent, request);
    }
    match declared_length(request.headers()) {
        Some(length) if length <= MAX_FORM_BODY => {}
        length => {
            debug!(?length, "form body not searched for an access token");
            return (Credential::Absent, request);
        }
    }

    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, MAX_FORM_BODY).await {
        Ok(bytes) => {
            let credential = param_credential(&bytes).unwrap_or(Credential::Absent);
            (credential, Request::from_parts(parts, Body::from(bytes)))
        }
        Err(e) => {
            // The body is gone either way; the handler sees it empty.
            debug!(error = %e, "unable to read form body");
            (Credential::Absent, Request::from_parts(parts, Body::empty()))
        }
    }
}

/// Turn a credential into an [`AuthContext`].
///
/// Any store failure yields an unauthenticated context.
pub async fn evaluate(
    credential: Credential,
    key: &SigningKey,
    store: &dyn SessionStore,
) -> AuthContext {
    let raw = match credential {
        Credential::Absent => return AuthContext::anonymous(),
        Credential::MissingScheme => {
            debug!("authorization credential without bearer scheme");
            return AuthContext::failed(AuthFailure::MissingScheme);
        }
        Credential::Token(raw) => raw,
    };

    let token = match SessionToken::validate(&raw, key) {
        Ok(token) => token,
        Err(e) => {
            info!(error = %e, "rejected session token");
            return AuthContext::failed(AuthFailure::InvalidToken);
        }
    };

    match store.get(&token).await {
        Ok(record) => AuthContext::active(ActiveSession { token, record }),
        Err(SessionStoreError::NotFound) => {
            info!(token = ?token, "no session for token");
            AuthContext::failed(AuthFailure::InvalidToken)
        }
        Err(e) => {
            warn!(error = %e, "session lookup failed, treating request as unauthenticated");
            AuthContext::failed(AuthFailure::StoreUnavailable)
        }
    }
}

/// Attach an [`AuthContext`] to every request.
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (credential, mut request) = extract_credential(request).await;

    let context = evaluate(credential, &state.signing_key, state.sessions.as_ref()).await;
    request.extensions_mut().insert(context);
    next.run(request).await
}
