// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Session endpoints: sign-in (or anonymous start) and sign-out.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{
        header::{CACHE_CONTROL, LOCATION, PRAGMA},
        HeaderMap, HeaderValue, StatusCode,
    },
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::{decode_json, ensure_json, GATEWAY_PREFIX};
use crate::auth::{AuthContext, CurrentSession};
use crate::error::ApiError;
use crate::session::{lifecycle, ActiveSession, SessionRecord, SessionStoreError, SessionToken};
use crate::state::AppState;
use crate::users::{credential, SignInCredentials, User, UserStoreError};

/// Path segment naming the caller's own session.
pub const THIS_SESSION: &str = "this";

const SESSIONS_CONTEXT: &str = "request made to sessions collection";

fn invalid_credentials(status: StatusCode) -> ApiError {
    ApiError::new(status, "invalid credentials").with_context(SESSIONS_CONTEXT)
}

fn session_not_found() -> ApiError {
    ApiError::bad_request("session not found").with_context(SESSIONS_CONTEXT)
}

fn not_your_session() -> ApiError {
    ApiError::forbidden("action not authorized for the requested resource")
        .with_context(SESSIONS_CONTEXT)
}

fn store_error(e: SessionStoreError) -> ApiError {
    match e {
        SessionStoreError::NotFound => session_not_found(),
        other => ApiError::internal(other).with_context(SESSIONS_CONTEXT),
    }
}

/// Look the user up and check the password. Any mismatch is a 403 that does
/// not say which part was wrong.
async fn sign_in(state: &AppState, credentials: SignInCredentials) -> Result<User, ApiError> {
    if credentials.validate().is_err() {
        return Err(invalid_credentials(StatusCode::BAD_REQUEST));
    }

    let encoded_hash = match state.users.read_encoded_hash(&credentials.username).await {
        Ok(hash) => hash,
        Err(UserStoreError::NotFound) => return Err(invalid_credentials(StatusCode::FORBIDDEN)),
        Err(e) => return Err(ApiError::internal(e).with_context(SESSIONS_CONTEXT)),
    };

    let password = credentials.password;
    let matches = tokio::task::spawn_blocking(move || credential::verify(&password, &encoded_hash))
        .await
        .map_err(ApiError::internal)?
        .map_err(|e| ApiError::internal(e).with_context(SESSIONS_CONTEXT))?;
    if !matches {
        info!(username = %credentials.username, "failed sign-in");
        return Err(invalid_credentials(StatusCode::FORBIDDEN));
    }

    let uuid = state
        .users
        .read_uuid(&credentials.username)
        .await
        .map_err(|e| ApiError::internal(e).with_context(SESSIONS_CONTEXT))?;
    state
        .users
        .read_profile(uuid)
        .await
        .map_err(|e| ApiError::internal(e).with_context(SESSIONS_CONTEXT))
}

/// Start a session.
///
/// An empty username starts an anonymous session. Valid credentials start an
/// authenticated one, upgrading a presented anonymous session in place.
#[utoipa::path(
    post,
    path = "/api/v1/gateway/sessions",
    tag = "Sessions",
    request_body = SignInCredentials,
    responses(
        (status = 201, description = "Session started, bearer token in Authorization header", body = User),
        (status = 400, description = "Malformed credentials"),
        (status = 403, description = "Wrong username or password"),
        (status = 415, description = "Body is not JSON"),
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthContext,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, HeaderMap, Json<User>), ApiError> {
    ensure_json(&headers)?;
    let credentials: SignInCredentials = decode_json(&body)?;

    let (token, record, user) = if credentials.is_anonymous() {
        let (token, session_uuid) = lifecycle::create(&state.signing_key)
            .map_err(|e| ApiError::internal(e).with_context(SESSIONS_CONTEXT))?;
        (token, SessionRecord::anonymous(session_uuid), User::anonymous())
    } else {
        let user = sign_in(&state, credentials).await?;
        let (token, record) =
            lifecycle::bind_user(&state.signing_key, auth.current_session(), user.clone())
                .map_err(|e| ApiError::internal(e).with_context(SESSIONS_CONTEXT))?;
        (token, record, user)
    };

    let mut response_headers = HeaderMap::new();
    lifecycle::begin(state.sessions.as_ref(), &token, &record, &mut response_headers)
        .await
        .map_err(|e| ApiError::internal(e).with_context(SESSIONS_CONTEXT))?;

    let location = state.public_api.url(&format!(
        "{GATEWAY_PREFIX}/sessions/{}",
        record.session_uuid()
    ));
    response_headers.insert(
        LOCATION,
        HeaderValue::from_str(&location).map_err(ApiError::internal)?,
    );
    response_headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((StatusCode::CREATED, response_headers, Json(user)))
}

/// Resolve which session a `DELETE /sessions/{id}` targets.
///
/// Ending someone else's session requires being signed in as the user who
/// owns it.
async fn target_session(
    state: &AppState,
    current: &ActiveSession,
    requested: &str,
) -> Result<SessionToken, ApiError> {
    if requested == THIS_SESSION {
        return Ok(current.token.clone());
    }

    let uuid = Uuid::parse_str(requested).map_err(|e| {
        ApiError::bad_request("unable to get valid uuid from path")
            .with_context(SESSIONS_CONTEXT)
            .with_detail(e)
    })?;
    if uuid == current.record.session_uuid() {
        return Ok(current.token.clone());
    }

    let Some(caller) = current.record.user().filter(|_| current.record.is_authenticated()) else {
        return Err(not_your_session());
    };

    let token = state.sessions.id_by_uuid(uuid).await.map_err(store_error)?;
    let target = state.sessions.get(&token).await.map_err(store_error)?;
    match target.user() {
        Some(owner) if target.is_authenticated() && owner.uuid == caller.uuid => Ok(token),
        _ => Err(not_your_session()),
    }
}

/// End the caller's session, or another session the caller owns.
#[utoipa::path(
    delete,
    path = "/api/v1/gateway/sessions/{session}",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("session" = String, Path, description = "`this` or a session uuid")),
    responses(
        (status = 200, description = "Session ended", body = String),
        (status = 400, description = "Session not found"),
        (status = 403, description = "Not in a session, or not the owner"),
    )
)]
pub async fn delete_session(
    State(state): State<AppState>,
    CurrentSession(current): CurrentSession,
    Path(requested): Path<String>,
) -> Result<&'static str, ApiError> {
    let token = target_session(&state, &current, &requested).await?;
    lifecycle::end(state.sessions.as_ref(), &token)
        .await
        .map_err(store_error)?;
    Ok("session successfully ended")
}
