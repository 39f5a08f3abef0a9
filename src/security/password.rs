//! Argon2id password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// Longest accepted password, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MIN_PASSWORD_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
}

/// Hash `plaintext` into a PHC string with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

/// True when `plaintext` matches the stored PHC string.
///
/// An account without a password (empty hash) never matches.
pub fn verify_password(plaintext: &str, stored: &str) -> Result<bool, PasswordError> {
    if stored.is_empty() {
        return Ok(false);
    }
    let parsed = PasswordHash::new(stored).map_err(|err| PasswordError::Malformed(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}
