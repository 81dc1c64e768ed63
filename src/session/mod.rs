// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! # Sessions
//!
//! Signed bearer tokens, the session records they reference, and the stores
//! that hold those records.
//!
//! | Backend                | Use                          |
//! |------------------------|------------------------------|
//! | [`MemorySessionStore`] | development and tests        |
//! | [`RedisSessionStore`]  | production, shared instances |

pub mod lifecycle;
pub mod memory;
pub mod record;
pub mod redis_store;
pub mod store;
pub mod token;

pub use lifecycle::{ActiveSession, SessionError};
pub use memory::MemorySessionStore;
pub use record::SessionRecord;
pub use redis_store::RedisSessionStore;
pub use store::{SessionStore, SessionStoreError};
pub use token::{SessionToken, SigningKey, TokenError};
