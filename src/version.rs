// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! API version negotiation.
//!
//! Clients may declare the API version they were written against in the
//! `Perceptia-Api-Version` header or the `apiVersion` query parameter, as
//! `major[.minor[.patch]]`. Requests that declare nothing are accepted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

pub const API_VERSION_HEADER: HeaderName = HeaderName::from_static("perceptia-api-version");
pub const API_VERSION_QUERY_PARAM: &str = "apiVersion";

/// Current API version of the gateway's own collections.
pub const GATEWAY_VERSION: SemVer = SemVer::new(0, 1, 0);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemVerError {
    #[error("version string is empty")]
    Empty,

    #[error("version has more than three components")]
    TooManyComponents,

    #[error("version component '{0}' is not a non-negative integer")]
    InvalidComponent(String),
}

/// `major.minor.patch`. Ordering compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for SemVer {
    type Err = SemVerError;

    /// Missing minor or patch components default to zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SemVerError::Empty);
        }

        let mut parts = [0u64; 3];
        for (index, component) in s.split('.').enumerate() {
            if index >= parts.len() {
                return Err(SemVerError::TooManyComponents);
            }
            // `u64::from_str` would accept a leading '+'.
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SemVerError::InvalidComponent(component.to_string()));
            }
            parts[index] = component
                .parse()
                .map_err(|_| SemVerError::InvalidComponent(component.to_string()))?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Which requested versions the gateway can serve.
#[derive(Debug, Clone)]
pub struct VersionPolicy {
    current: SemVer,
    lines: BTreeMap<u64, SemVer>,
}

impl VersionPolicy {
    /// `lines` maps each supported major version to the newest version of
    /// that line. `current` is always registered as its own line.
    pub fn new(current: SemVer, lines: impl IntoIterator<Item = SemVer>) -> Self {
        let mut map: BTreeMap<u64, SemVer> = lines.into_iter().map(|v| (v.major, v)).collect();
        map.insert(current.major, current);
        Self {
            current,
            lines: map,
        }
    }

    pub fn current(&self) -> SemVer {
        self.current
    }

    /// Pre-1.0 lines are unstable: the minor version must match exactly and
    /// only patch releases up to the gateway's are accepted. From 1.0 on,
    /// any version up to the newest of the requested major line is served.
    pub fn is_compatible(&self, requested: SemVer) -> bool {
        if self.current.major == 0 {
            requested.major == self.current.major
                && requested.minor == self.current.minor
                && self.current.patch >= requested.patch
        } else {
            self.lines
                .get(&requested.major)
                .is_some_and(|line| *line >= requested)
        }
    }

    /// Supported versions, lowest major first, as `0.1.0, 1.2.0`.
    pub fn supported_list(&self) -> String {
        let versions: Vec<String> = if self.current.major == 0 {
            vec![self.current.to_string()]
        } else {
            self.lines.values().map(SemVer::to_string).collect()
        };
        versions.join(", ")
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.current.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0.0.0"))
    }
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self::new(GATEWAY_VERSION, [GATEWAY_VERSION])
    }
}

/// The version the client asked for, if it asked.
///
/// The header wins over the query parameter. Empty values count as absent.
pub fn requested_version(headers: &HeaderMap, uri: &Uri) -> Option<Result<SemVer, SemVerError>> {
    let raw = headers
        .get(&API_VERSION_HEADER)
        .map(|v| v.to_str().map(str::to_string).unwrap_or_else(|_| "\u{fffd}".into()))
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            uri.query().and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == API_VERSION_QUERY_PARAM)
                    .map(|(_, value)| value.into_owned())
                    .filter(|v| !v.trim().is_empty())
            })
        })?;
    Some(raw.parse())
}

/// Reject requests declaring an API version this gateway cannot serve.
pub async fn ensure_version_supported(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    const CONTEXT: &str = "request made to gateway collection";

    match requested_version(request.headers(), request.uri()) {
        None => next.run(request).await,
        Some(Err(e)) => ApiError::bad_request(
            "api version specified, but could not be understood, not a valid api version",
        )
        .with_context(CONTEXT)
        .with_detail(e)
        .into_response(),
        Some(Ok(requested)) if !state.versions.is_compatible(requested) => {
            ApiError::bad_request(format!(
                "api version not supported, requested version: {requested} supported versions: {}",
                state.versions.supported_list()
            ))
            .with_context(CONTEXT)
            .into_response()
        }
        Some(Ok(_)) => next.run(request).await,
    }
}
