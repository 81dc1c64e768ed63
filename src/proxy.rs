// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Reverse proxy to backend services.
//!
//! Backends trust the `Perceptia-User-Uuid` and `Perceptia-Session-Uuid`
//! headers. Whatever the client sent under those names is discarded, and they
//! are set again only from the session verified for this request.

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Uri},
    response::Response,
};
use tracing::debug;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

pub const USER_UUID_HEADER: HeaderName = HeaderName::from_static("perceptia-user-uuid");
pub const SESSION_UUID_HEADER: HeaderName = HeaderName::from_static("perceptia-session-uuid");
pub const FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection-scoped headers that must not be forwarded (RFC 9110 §7.6.1).
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid backend url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("unable to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Rewrite outbound request headers for a backend.
///
/// Trust headers are always removed first. They are only set again when the
/// request carried a valid session: the session uuid for any active session,
/// the user uuid only when that session is authenticated. The client address,
/// when known, is appended to `X-Forwarded-For`.
pub fn direct(headers: &mut HeaderMap, auth: &AuthContext, client: Option<IpAddr>) {
    headers.remove(&USER_UUID_HEADER);
    headers.remove(&SESSION_UUID_HEADER);
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(header::HOST);
    // Backends get identity from the trust headers, never the bearer token.
    headers.remove(header::AUTHORIZATION);

    if let Some(user) = auth.current_user() {
        if let Ok(value) = HeaderValue::from_str(&user.uuid.to_string()) {
            headers.insert(USER_UUID_HEADER, value);
        }
    }
    if let Some(session_uuid) = auth.current_session_uuid() {
        if let Ok(value) = HeaderValue::from_str(&session_uuid.to_string()) {
            headers.insert(SESSION_UUID_HEADER, value);
        }
    }
    if let Some(client) = client {
        append_forwarded_for(headers, client);
    }
}

/// Prior hops are folded into one comma separated value, client last.
fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&FORWARDED_FOR_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let chain = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {client}", prior.join(", "))
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(FORWARDED_FOR_HEADER, value);
    }
}

/// A single backend service, reached over plain HTTP inside the cluster.
pub struct ServiceProxy {
    client: reqwest::Client,
    base: url::Url,
}

impl ServiceProxy {
    pub fn new(base_url: &str) -> Result<Self, ProxyError> {
        let base = url::Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, base })
    }

    /// Backend URL for an inbound request URI; path and query are kept.
    pub fn target_url(&self, uri: &Uri) -> url::Url {
        let mut target = self.base.clone();
        target.set_path(uri.path());
        target.set_query(uri.query());
        target
    }

    /// Forward `request` and relay the backend's answer.
    ///
    /// Bodies are streamed in both directions and never held in memory whole.
    pub async fn forward(&self, request: Request, auth: &AuthContext) -> Result<Response, ApiError> {
        let (parts, body) = request.into_parts();
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let target = self.target_url(&parts.uri);
        let mut headers = parts.headers;
        direct(&mut headers, auth, client);

        debug!(method = %parts.method, target = %target, "forwarding request");
        let mut outbound = self.client.request(parts.method, target).headers(headers);
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        let upstream = outbound
            .send()
            .await
            .map_err(|e| ApiError::bad_gateway(e).with_context("forwarding request to backend"))?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        for name in &HOP_BY_HOP {
            response_headers.remove(name);
        }

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Handler for `/api/aqrest/{*rest}`.
pub async fn aqrest(
    State(state): State<AppState>,
    auth: AuthContext,
    request: Request,
) -> Result<Response, ApiError> {
    state.aqrest.forward(request, &auth).await
}
