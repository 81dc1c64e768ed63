// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! User account types and input validation.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use uuid::Uuid;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 500;
pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 255;
pub const FULL_NAME_MAX_LENGTH: usize = 255;
pub const DISPLAY_NAME_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("password must be at least {} characters long", PASSWORD_MIN_LENGTH)]
    PasswordTooShort,
    #[error("password must be no more than {} characters long", PASSWORD_MAX_LENGTH)]
    PasswordTooLong,
    #[error("username must be at least {} characters long", USERNAME_MIN_LENGTH)]
    UsernameTooShort,
    #[error("username must be no more than {} characters long", USERNAME_MAX_LENGTH)]
    UsernameTooLong,
    #[error("username must not have any spaces")]
    UsernameHasSpace,
    #[error("full name must be no more than {} characters long", FULL_NAME_MAX_LENGTH)]
    FullNameTooLong,
    #[error("display name must be no more than {} characters long", DISPLAY_NAME_MAX_LENGTH)]
    DisplayNameTooLong,
    #[error("the provided username or password are invalid")]
    InvalidCredentials,
}

/// Public profile of a user account.
///
/// Sessions hold a snapshot of this, not a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uuid: Uuid,
    pub username: String,
    pub full_name: String,
    pub display_name: String,
}

impl User {
    /// Placeholder returned to clients that start an anonymous session.
    pub fn anonymous() -> Self {
        Self {
            uuid: Uuid::nil(),
            username: String::new(),
            full_name: String::new(),
            display_name: String::new(),
        }
    }
}

/// Account to be created. `encoded_hash` is produced by
/// [`super::credential::hash_password`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub display_name: String,
    pub encoded_hash: String,
}

impl NewUser {
    /// Trim and NFC-normalise the user supplied names.
    pub fn prepare(&mut self) {
        self.username = prep_name(&self.username);
        self.full_name = prep_name(&self.full_name);
        self.display_name = prep_name(&self.display_name);
    }

    /// Returns the first rule violated, if any.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        if self.full_name.chars().count() > FULL_NAME_MAX_LENGTH {
            return Err(ValidationError::FullNameTooLong);
        }
        if self.display_name.chars().count() > DISPLAY_NAME_MAX_LENGTH {
            return Err(ValidationError::DisplayNameTooLong);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignInCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl SignInCredentials {
    /// An empty username means the client only wants an anonymous session.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Rejects credentials that could never match an account, without
    /// saying which half was wrong.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if validate_username(&self.username).is_err() || validate_password(&self.password).is_err()
        {
            return Err(ValidationError::InvalidCredentials);
        }
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LENGTH {
        Err(ValidationError::PasswordTooShort)
    } else if len > PASSWORD_MAX_LENGTH {
        Err(ValidationError::PasswordTooLong)
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::UsernameHasSpace);
    }
    let len = username.chars().count();
    if len < USERNAME_MIN_LENGTH {
        Err(ValidationError::UsernameTooShort)
    } else if len > USERNAME_MAX_LENGTH {
        Err(ValidationError::UsernameTooLong)
    } else {
        Ok(())
    }
}

fn prep_name(value: &str) -> String {
    value.trim().nfc().collect()
}
