// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Readiness response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    /// "ready" or "not ready".
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    /// Last result of the background session store ping.
    pub session_store: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness probe handler.
///
/// Reflects the store health monitor; it does not touch the store itself.
#[utoipa::path(
    get,
    path = "/api/v1/gateway/health",
    tag = "Health",
    responses(
        (status = 200, description = "Gateway is ready", body = ReadyResponse),
        (status = 503, description = "Session store unreachable", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let ready = state.readiness.is_ready();
    let response = ReadyResponse {
        status: if ready { "ready" } else { "not ready" }.to_string(),
        checks: HealthChecks {
            session_store: if ready { "ok" } else { "unavailable" }.to_string(),
        },
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness probe handler. Always 200 while the process serves requests.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Gateway is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
