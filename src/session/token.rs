// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Digitally-signed session tokens.
//!
//! A token is the base64url (padded) encoding of:
//!
//! ```text
//! +-------------------------------+------------------------------+
//! | 32 cryptographically random B | HMAC-SHA256 of those bytes   |
//! +-------------------------------+------------------------------+
//! ```
//!
//! It carries no claims. It is only a capability reference into the session
//! store, and can be checked without any I/O.

use std::fmt;

use base64ct::{Base64Url, Encoding};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of the random identifier portion.
pub const ID_LENGTH: usize = 32;

/// Length of the HMAC-SHA256 signature portion.
pub const MAC_LENGTH: usize = 32;

/// Length of a decoded token.
pub const SIGNED_LENGTH: usize = ID_LENGTH + MAC_LENGTH;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing key must not be empty")]
    KeyEmpty,

    #[error("unable to read from the random source")]
    RandomSource,

    #[error("session token is malformed")]
    Malformed,

    #[error("session token is not valid")]
    SignatureMismatch,
}

/// Server-held HMAC key. Never empty.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TokenError::KeyEmpty);
        }
        Ok(Self(key))
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.0).map_err(|_| TokenError::KeyEmpty)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// A session token whose signature has been generated or verified with a
/// [`SigningKey`]. Holding one means the signature checked out; it says
/// nothing about whether the session still exists in the store.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a new token signed with `key`.
    pub fn generate(key: &SigningKey) -> Result<Self, TokenError> {
        let mut raw = vec![0u8; ID_LENGTH];
        SystemRandom::new()
            .fill(&mut raw)
            .map_err(|_| TokenError::RandomSource)?;

        let mut mac = key.mac()?;
        mac.update(&raw);
        raw.extend_from_slice(&mac.finalize().into_bytes());

        Ok(Self(Base64Url::encode_string(&raw)))
    }

    /// Check the signature of `raw` against `key`.
    ///
    /// A bad signature yields [`TokenError::SignatureMismatch`], never
    /// [`TokenError::Malformed`], so a tampered token is reported the same
    /// way regardless of which byte was changed.
    pub fn validate(raw: &str, key: &SigningKey) -> Result<Self, TokenError> {
        let decoded = Base64Url::decode_vec(raw).map_err(|_| TokenError::Malformed)?;
        if decoded.len() != SIGNED_LENGTH {
            return Err(TokenError::Malformed);
        }
        let (message, signature) = decoded.split_at(ID_LENGTH);

        let mut mac = key.mac()?;
        mac.update(message);
        mac.verify_slice(signature)
            .map_err(|_| TokenError::SignatureMismatch)?;

        Ok(Self(raw.to_string()))
    }

    /// Rebuild a token read back from a session store index. The store only
    /// ever holds tokens that were generated by this process.
    pub(super) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Bearer tokens must not end up in logs through `{:?}`.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}..)")
    }
}
