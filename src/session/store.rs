// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Session store contract.

use async_trait::async_trait;
use uuid::Uuid;

use super::{SessionRecord, SessionToken};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session not found")]
    NotFound,

    #[error("unable to serialize session: {0}")]
    Serialization(String),

    #[error("session store unavailable: {0}")]
    BackendUnavailable(String),
}

/// Session state keyed by token.
///
/// Every successful [`get`](SessionStore::get) refreshes the expiry, so a
/// session lives as long as it keeps being used. Writes and deletes are atomic
/// per key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace, resetting the expiry.
    async fn save(&self, token: &SessionToken, record: &SessionRecord)
        -> Result<(), SessionStoreError>;

    /// Fetch and refresh the expiry in one step.
    async fn get(&self, token: &SessionToken) -> Result<SessionRecord, SessionStoreError>;

    async fn exists(&self, token: &SessionToken) -> Result<bool, SessionStoreError>;

    /// Deleting an absent session is not an error.
    async fn delete(&self, token: &SessionToken) -> Result<(), SessionStoreError>;

    /// Resolve a session uuid back to the token it is stored under.
    async fn id_by_uuid(&self, session_uuid: Uuid) -> Result<SessionToken, SessionStoreError>;

    /// Round trip to the backend, used by the readiness monitor.
    async fn ping(&self) -> Result<(), SessionStoreError>;
}
