// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! # Users
//!
//! Account model, input validation, password credentials and the user store
//! contract the gateway depends on.

pub mod credential;
pub mod model;
pub mod store;

pub use credential::CredentialError;
pub use model::{NewUser, SignInCredentials, User, ValidationError};
pub use store::{InMemoryUserStore, UserStore, UserStoreError};
