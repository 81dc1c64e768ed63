// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Per-request authentication state.

use uuid::Uuid;

use super::AuthFailure;
use crate::session::ActiveSession;
use crate::users::User;

/// Result of evaluating the request's bearer token exactly once.
///
/// Inserted into the request extensions by
/// [`authenticate`](super::middleware::authenticate). Later stages only read
/// it through the accessors; nothing re-parses the `Authorization` header.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    session: Option<ActiveSession>,
    failure: Option<AuthFailure>,
}

impl AuthContext {
    /// No credential was presented.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn failed(failure: AuthFailure) -> Self {
        Self {
            session: None,
            failure: Some(failure),
        }
    }

    pub fn active(session: ActiveSession) -> Self {
        Self {
            session: Some(session),
            failure: None,
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.record.is_authenticated())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().and_then(|s| s.record.user())
    }

    pub fn current_session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    pub fn current_session_uuid(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.record.session_uuid())
    }

    pub fn failure(&self) -> Option<AuthFailure> {
        self.failure
    }
}
