// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Authentication failures and the RFC 6750 challenge built from them.

use axum::http::HeaderValue;

/// Realm every bearer challenge is issued for.
pub const BEARER_REALM: &str = r#"Bearer realm="/api/""#;

/// Why a presented credential did not produce a session.
///
/// Recorded by the authentication middleware and acted on by the gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// A credential was sent without the `Bearer` scheme.
    MissingScheme,
    /// Malformed token, bad signature or unknown session. These are
    /// deliberately indistinguishable to the client.
    InvalidToken,
    /// The session store could not answer; nothing is claimed about the token.
    StoreUnavailable,
}

impl AuthFailure {
    /// RFC 6750 §3.1 error code, if the failure maps to one.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            AuthFailure::MissingScheme => Some("invalid_request"),
            AuthFailure::InvalidToken => Some("invalid_token"),
            AuthFailure::StoreUnavailable => None,
        }
    }

    fn description(&self) -> Option<&'static str> {
        match self {
            AuthFailure::MissingScheme => Some("Bearer scheme not provided"),
            AuthFailure::InvalidToken => Some("token extracted not a valid session token"),
            AuthFailure::StoreUnavailable => None,
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::MissingScheme => write!(f, "authorization scheme is not Bearer"),
            AuthFailure::InvalidToken => write!(f, "session token is not valid"),
            AuthFailure::StoreUnavailable => write!(f, "session store unavailable"),
        }
    }
}

/// Value for `WWW-Authenticate` on a 401.
pub fn challenge(failure: Option<AuthFailure>) -> HeaderValue {
    let mut value = BEARER_REALM.to_string();
    if let Some(failure) = failure {
        if let (Some(code), Some(description)) = (failure.error_code(), failure.description()) {
            value.push_str(&format!(r#", error="{code}", error_description="{description}""#));
        }
    }
    // Built only from the constants above, so always a valid header value.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(BEARER_REALM))
}
