// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Server-side session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::User;

/// State stored under a [`super::SessionToken`].
///
/// `authenticated` is true exactly when `user` is present. Fields are private
/// so that the two can only change together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    session_uuid: Uuid,
    created_at: DateTime<Utc>,
    authenticated: bool,
    user: Option<User>,
}

impl SessionRecord {
    /// A session not bound to any user.
    pub fn anonymous(session_uuid: Uuid) -> Self {
        Self {
            session_uuid,
            created_at: Utc::now(),
            authenticated: false,
            user: None,
        }
    }

    pub fn authenticated(session_uuid: Uuid, user: User) -> Self {
        Self {
            session_uuid,
            created_at: Utc::now(),
            authenticated: true,
            user: Some(user),
        }
    }

    /// Bind `user` to this session, keeping its uuid and creation time.
    pub fn upgrade(self, user: User) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
            ..self
        }
    }

    pub fn session_uuid(&self) -> Uuid {
        self.session_uuid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated && self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref().filter(|_| self.authenticated)
    }

    /// Reject stored state that breaks the authenticated/user pairing.
    pub(crate) fn is_consistent(&self) -> bool {
        self.authenticated == self.user.is_some()
    }
}
