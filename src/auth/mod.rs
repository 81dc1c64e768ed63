// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! # Authentication Module
//!
//! ## Request Flow
//!
//! 1. [`middleware::authenticate`] runs on every request behind CORS:
//!    - extracts the bearer token (`Authorization` header, then the
//!      `access_token` query or form parameter)
//!    - verifies its HMAC signature
//!    - loads the session record from the store
//!    - attaches the outcome as an [`AuthContext`]; it never rejects
//! 2. [`gates::require_authenticated_user`] (401) and
//!    [`gates::require_active_session`] (403) are layered per route subtree.
//! 3. Handlers read identity only through [`AuthContext`] or the extractors.
//!
//! ## Security
//!
//! - Store errors and timeouts leave the request unauthenticated
//! - A bad signature and an unknown session produce the same client error

pub mod context;
pub mod error;
pub mod extractor;
pub mod gates;
pub mod middleware;

pub use context::AuthContext;
pub use error::{challenge, AuthFailure};
pub use extractor::{Authenticated, CurrentSession};
pub use gates::{require_active_session, require_authenticated_user};
pub use middleware::authenticate;
