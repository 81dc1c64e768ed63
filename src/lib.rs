// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Perceptia Gateway - TLS-terminating API gateway
//!
//! Authenticates every request from a signed bearer session token, gates
//! routes on session state and API version, and forwards backend traffic
//! with trust headers derived from the verified session.
//!
//! ## Modules
//!
//! - `api` - gateway collections (users, sessions, health) and the router
//! - `auth` - authentication middleware, gates and extractors
//! - `session` - tokens, session records and the session store
//! - `users` - user model, credential hashing and the user store
//! - `proxy` - trust-header director and backend forwarding
//! - `version` - API version negotiation

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod proxy;
pub mod session;
pub mod state;
pub mod users;
pub mod version;
