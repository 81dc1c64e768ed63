// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! In-process session store with sliding expiry, for development and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use super::{SessionRecord, SessionStore, SessionStoreError, SessionToken};

struct Entry {
    record: SessionRecord,
    expires_at: Instant,
}

#[derive(Default)]
struct Sessions {
    by_token: HashMap<String, Entry>,
    by_uuid: HashMap<Uuid, String>,
}

impl Sessions {
    /// Drop `token` if its expiry has passed; returns the live entry otherwise.
    fn live(&mut self, token: &str) -> Option<&mut Entry> {
        let expired = match self.by_token.get(token) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => return None,
        };
        if expired {
            self.remove(token);
            return None;
        }
        self.by_token.get_mut(token)
    }

    fn remove(&mut self, token: &str) {
        if let Some(entry) = self.by_token.remove(token) {
            self.by_uuid.remove(&entry.record.session_uuid());
        }
    }
}

pub struct MemorySessionStore {
    sessions: Mutex<Sessions>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Sessions>, SessionStoreError> {
        self.sessions
            .lock()
            .map_err(|_| SessionStoreError::BackendUnavailable("session map poisoned".into()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(
        &self,
        token: &SessionToken,
        record: &SessionRecord,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.lock()?;
        sessions.remove(token.as_str());
        sessions
            .by_uuid
            .insert(record.session_uuid(), token.as_str().to_string());
        sessions.by_token.insert(
            token.as_str().to_string(),
            Entry {
                record: record.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, token: &SessionToken) -> Result<SessionRecord, SessionStoreError> {
        let ttl = self.ttl;
        let mut sessions = self.lock()?;
        let entry = sessions
            .live(token.as_str())
            .ok_or(SessionStoreError::NotFound)?;
        entry.expires_at = Instant::now() + ttl;
        Ok(entry.record.clone())
    }

    async fn exists(&self, token: &SessionToken) -> Result<bool, SessionStoreError> {
        Ok(self.lock()?.live(token.as_str()).is_some())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        self.lock()?.remove(token.as_str());
        Ok(())
    }

    async fn id_by_uuid(&self, session_uuid: Uuid) -> Result<SessionToken, SessionStoreError> {
        let mut sessions = self.lock()?;
        let token = sessions
            .by_uuid
            .get(&session_uuid)
            .cloned()
            .ok_or(SessionStoreError::NotFound)?;
        if sessions.live(&token).is_none() {
            return Err(SessionStoreError::NotFound);
        }
        Ok(SessionToken::from_stored(token))
    }

    async fn ping(&self) -> Result<(), SessionStoreError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SigningKey;

    fn token() -> SessionToken {
        SessionToken::generate(&SigningKey::new("memory store").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn save_then_get() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let token = token();
        let record = SessionRecord::anonymous(Uuid::new_v4());

        store.save(&token, &record).await.unwrap();
        assert_eq!(store.get(&token).await.unwrap(), record);
        assert!(store.exists(&token).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let token = token();

        store.delete(&token).await.unwrap();
        assert_eq!(store.get(&token).await.unwrap_err(), SessionStoreError::NotFound);

        store
            .save(&token, &SessionRecord::anonymous(Uuid::new_v4()))
            .await
            .unwrap();
        store.delete(&token).await.unwrap();
        store.delete(&token).await.unwrap();
        assert_eq!(store.get(&token).await.unwrap_err(), SessionStoreError::NotFound);
        assert!(!store.exists(&token).await.unwrap());
    }

    #[tokio::test]
    async fn reads_slide_the_expiry() {
        let store = MemorySessionStore::new(Duration::from_millis(200));
        let token = token();
        store
            .save(&token, &SessionRecord::anonymous(Uuid::new_v4()))
            .await
            .unwrap();

        // Each read lands before the previous expiry and pushes it out.
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(80)).await;
            assert!(store.get(&token).await.is_ok());
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.get(&token).await.unwrap_err(), SessionStoreError::NotFound);
    }

    #[tokio::test]
    async fn lookup_by_session_uuid() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let token = token();
        let session_uuid = Uuid::new_v4();
        store
            .save(&token, &SessionRecord::anonymous(session_uuid))
            .await
            .unwrap();

        assert_eq!(store.id_by_uuid(session_uuid).await.unwrap(), token);

        store.delete(&token).await.unwrap();
        assert_eq!(
            store.id_by_uuid(session_uuid).await.unwrap_err(),
            SessionStoreError::NotFound
        );
    }
}
