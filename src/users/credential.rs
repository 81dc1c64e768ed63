// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Password hashing and verification (Argon2id, PHC string encoding).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use super::model::{validate_password, ValidationError};

/// Memory cost in KiB.
const MEMORY_COST: u32 = 64 * 1024;
const ITERATIONS: u32 = 1;
const PARALLELISM: u32 = 2;
const OUTPUT_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    InvalidPassword(#[from] ValidationError),

    #[error("the encoded hash is not in the correct format")]
    MalformedHash,

    #[error("unable to hash password: {0}")]
    Hashing(String),
}

fn hasher() -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(MEMORY_COST, ITERATIONS, PARALLELISM, Some(OUTPUT_LENGTH))
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Returns `Ok(false)` when the password simply does not match.
pub fn verify(password: &str, encoded_hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(encoded_hash).map_err(|_| CredentialError::MalformedHash)?;
    // Parameters come from the encoded hash, not from the defaults above.
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(CredentialError::MalformedHash),
    }
}
