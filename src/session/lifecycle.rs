// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Creating, binding and ending sessions.

use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::info;
use uuid::Uuid;

use super::{SessionRecord, SessionStore, SessionStoreError, SessionToken, SigningKey, TokenError};
use crate::users::User;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// A verified token together with the record it currently maps to.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub token: SessionToken,
    pub record: SessionRecord,
}

/// Mint a token and session uuid. Nothing is stored yet.
pub fn create(key: &SigningKey) -> Result<(SessionToken, Uuid), TokenError> {
    Ok((SessionToken::generate(key)?, Uuid::new_v4()))
}

/// Store `record` under `token` and hand the token to the client.
///
/// This is the only place a bearer token is written to a response.
pub async fn begin(
    store: &dyn SessionStore,
    token: &SessionToken,
    record: &SessionRecord,
    headers: &mut HeaderMap,
) -> Result<(), SessionError> {
    store.save(token, record).await?;

    let value = HeaderValue::try_from(format!("Bearer {}", token.as_str()))
        .map_err(|_| TokenError::Malformed)?;
    headers.insert(AUTHORIZATION, value);

    info!(
        session_uuid = %record.session_uuid(),
        authenticated = record.is_authenticated(),
        "session started"
    );
    Ok(())
}

/// Delete the session under `token`.
///
/// Unlike [`SessionStore::delete`], an absent session is reported as
/// [`SessionStoreError::NotFound`].
pub async fn end(store: &dyn SessionStore, token: &SessionToken) -> Result<(), SessionStoreError> {
    if !store.exists(token).await? {
        return Err(SessionStoreError::NotFound);
    }
    store.delete(token).await?;
    info!("session ended");
    Ok(())
}

/// Decide which token and record a successful sign-in or sign-up is bound to.
///
/// A valid anonymous session presented with the request is upgraded in place
/// and keeps its token. Anything else gets a freshly minted session.
pub fn bind_user(
    key: &SigningKey,
    current: Option<&ActiveSession>,
    user: User,
) -> Result<(SessionToken, SessionRecord), TokenError> {
    match current {
        Some(active) if !active.record.is_authenticated() => Ok((
            active.token.clone(),
            active.record.clone().upgrade(user),
        )),
        _ => {
            let (token, session_uuid) = create(key)?;
            Ok((token, SessionRecord::authenticated(session_uuid, user)))
        }
    }
}
