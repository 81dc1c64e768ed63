// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! User account endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{decode_json, ensure_json, GATEWAY_PREFIX};
use crate::auth::{AuthContext, Authenticated};
use crate::error::ApiError;
use crate::session::lifecycle;
use crate::state::AppState;
use crate::users::{credential, NewUser, User, UserStoreError};

/// Sign-up request body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub password: String,
}

const USERS_CONTEXT: &str = "request made to users collection";

pub(crate) fn user_location(state: &AppState, uuid: Uuid) -> Result<HeaderValue, ApiError> {
    let url = state
        .public_api
        .url(&format!("{GATEWAY_PREFIX}/users/{uuid}"));
    HeaderValue::from_str(&url).map_err(ApiError::internal)
}

fn parse_user_uuid(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| {
        ApiError::bad_request("unable to get valid uuid from path")
            .with_context(USERS_CONTEXT)
            .with_detail(e)
    })
}

fn user_store_error(e: UserStoreError) -> ApiError {
    match e {
        UserStoreError::NotFound => ApiError::not_found("user not found"),
        UserStoreError::UsernameTaken => {
            ApiError::conflict("username unavailable, please select a different user name")
        }
        other => ApiError::internal(other),
    }
    .with_context(USERS_CONTEXT)
}

/// Create an account and start an authenticated session for it.
///
/// A valid anonymous session presented with the request is upgraded in place
/// and keeps its token.
#[utoipa::path(
    post,
    path = "/api/v1/gateway/users",
    tag = "Users",
    request_body = NewUserRequest,
    responses(
        (status = 201, description = "User created, bearer token in Authorization header", body = User),
        (status = 400, description = "Invalid user or password"),
        (status = 409, description = "Username unavailable"),
        (status = 415, description = "Body is not JSON"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, HeaderMap, Json<User>), ApiError> {
    ensure_json(&headers)?;
    let request: NewUserRequest = decode_json(&body)?;

    let mut new_user = NewUser {
        username: request.username,
        full_name: request.full_name,
        display_name: request.display_name,
        encoded_hash: String::new(),
    };
    new_user.prepare();

    if let Err(e) = crate::users::model::validate_password(&request.password) {
        return Err(ApiError::bad_request(format!(
            "the provided password is not a valid password: {e}"
        ))
        .with_context(USERS_CONTEXT));
    }
    if let Err(e) = new_user.validate() {
        return Err(ApiError::bad_request(format!(
            "the provided new user is not a valid user: {e}"
        ))
        .with_context(USERS_CONTEXT));
    }

    match state.users.read_uuid(&new_user.username).await {
        Ok(_) => return Err(user_store_error(UserStoreError::UsernameTaken)),
        Err(UserStoreError::NotFound) => {}
        Err(e) => return Err(user_store_error(e)),
    }

    let password = request.password;
    new_user.encoded_hash = tokio::task::spawn_blocking(move || credential::hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let user = state.users.create(new_user).await.map_err(user_store_error)?;
    info!(user_uuid = %user.uuid, "user created");

    let (token, record) = lifecycle::bind_user(&state.signing_key, auth.current_session(), user.clone())
        .map_err(|e| ApiError::internal(e).with_context(USERS_CONTEXT))?;

    let mut response_headers = HeaderMap::new();
    lifecycle::begin(state.sessions.as_ref(), &token, &record, &mut response_headers)
        .await
        .map_err(|e| ApiError::internal(e).with_context("beginning session for new user"))?;
    response_headers.insert(LOCATION, user_location(&state, user.uuid)?);

    Ok((StatusCode::CREATED, response_headers, Json(user)))
}

/// Profile of the signed-in user. Other users' profiles are not visible.
#[utoipa::path(
    get,
    path = "/api/v1/gateway/users/{uuid}",
    tag = "Users",
    security(("bearer" = [])),
    params(("uuid" = String, Path, description = "User uuid")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not in a session, or not this user"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Authenticated { user, .. }: Authenticated,
    Path(raw_uuid): Path<String>,
) -> Result<Json<User>, ApiError> {
    let requested = parse_user_uuid(&raw_uuid)?;
    if requested != user.uuid {
        return Err(
            ApiError::forbidden("action not authorized for the requested resource")
                .with_context(USERS_CONTEXT)
                .with_detail(format!("user {} requested profile of {requested}", user.uuid)),
        );
    }

    let profile = state
        .users
        .read_profile(requested)
        .await
        .map_err(user_store_error)?;
    Ok(Json(profile))
}

/// Delete the signed-in user's account and end the session used to do it.
#[utoipa::path(
    delete,
    path = "/api/v1/gateway/users/{uuid}",
    tag = "Users",
    security(("bearer" = [])),
    params(("uuid" = String, Path, description = "User uuid")),
    responses(
        (status = 200, description = "Account deleted", body = String),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not in a session, or not this user"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Authenticated { user, session }: Authenticated,
    Path(raw_uuid): Path<String>,
) -> Result<&'static str, ApiError> {
    let requested = parse_user_uuid(&raw_uuid)?;
    if requested != user.uuid {
        return Err(
            ApiError::forbidden("action not authorized for the requested resource")
                .with_context(USERS_CONTEXT)
                .with_detail(format!("user {} tried to delete {requested}", user.uuid)),
        );
    }

    state.users.delete(requested).await.map_err(user_store_error)?;
    info!(user_uuid = %requested, "user deleted");

    if let Err(e) = state.sessions.delete(&session.token).await {
        warn!(error = %e, "account deleted but its session could not be removed");
    }
    Ok("account deleted successfully")
}
