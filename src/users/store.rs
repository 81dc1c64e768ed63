// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! User account storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{NewUser, User};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UserStoreError {
    #[error("user not found")]
    NotFound,

    #[error("username is already taken")]
    UsernameTaken,

    #[error("a user with that uuid already exists")]
    AlreadyExists,

    #[error("user store unavailable: {0}")]
    Backend(String),
}

/// Storage for user accounts. Implementations own their own locking.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn read_encoded_hash(&self, username: &str) -> Result<String, UserStoreError>;

    async fn read_uuid(&self, username: &str) -> Result<Uuid, UserStoreError>;

    async fn read_profile(&self, uuid: Uuid) -> Result<User, UserStoreError>;

    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError>;

    async fn delete(&self, uuid: Uuid) -> Result<(), UserStoreError>;
}

struct StoredUser {
    profile: User,
    encoded_hash: String,
}

#[derive(Default)]
struct Accounts {
    by_uuid: HashMap<Uuid, StoredUser>,
    by_username: HashMap<String, Uuid>,
}

/// Process-local user store, used in development and tests.
#[derive(Default)]
pub struct InMemoryUserStore {
    accounts: RwLock<Accounts>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn read_encoded_hash(&self, username: &str) -> Result<String, UserStoreError> {
        let accounts = self.accounts.read().await;
        accounts
            .by_username
            .get(username)
            .and_then(|uuid| accounts.by_uuid.get(uuid))
            .map(|stored| stored.encoded_hash.clone())
            .ok_or(UserStoreError::NotFound)
    }

    async fn read_uuid(&self, username: &str) -> Result<Uuid, UserStoreError> {
        let accounts = self.accounts.read().await;
        accounts
            .by_username
            .get(username)
            .copied()
            .ok_or(UserStoreError::NotFound)
    }

    async fn read_profile(&self, uuid: Uuid) -> Result<User, UserStoreError> {
        let accounts = self.accounts.read().await;
        accounts
            .by_uuid
            .get(&uuid)
            .map(|stored| stored.profile.clone())
            .ok_or(UserStoreError::NotFound)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.by_username.contains_key(&new_user.username) {
            return Err(UserStoreError::UsernameTaken);
        }
        let uuid = Uuid::new_v4();
        if accounts.by_uuid.contains_key(&uuid) {
            return Err(UserStoreError::AlreadyExists);
        }

        let profile = User {
            uuid,
            username: new_user.username,
            full_name: new_user.full_name,
            display_name: new_user.display_name,
        };
        accounts.by_username.insert(profile.username.clone(), uuid);
        accounts.by_uuid.insert(
            uuid,
            StoredUser {
                profile: profile.clone(),
                encoded_hash: new_user.encoded_hash,
            },
        );
        Ok(profile)
    }

    async fn delete(&self, uuid: Uuid) -> Result<(), UserStoreError> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts.by_uuid.remove(&uuid).ok_or(UserStoreError::NotFound)?;
        accounts.by_username.remove(&stored.profile.username);
        Ok(())
    }
}
