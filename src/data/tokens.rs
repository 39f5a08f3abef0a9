//! Activation and authentication tokens.
//!
//! Only the SHA-256 hash of a token is kept by the store; the plaintext is
//! handed to the client once, when the token is issued.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::validator::Validator;

/// Length of a plaintext token.
pub const TOKEN_LENGTH: usize = 26;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// What a token may be exchanged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub hash: String,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    /// A fresh random token for `user_id`, expiring `ttl` from now.
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Self {
        let mut rng = rand::thread_rng();
        let plaintext: String = (0..TOKEN_LENGTH)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self::from_plaintext(plaintext, user_id, expiry_after(ttl), scope)
    }

    /// Wrap a known plaintext, e.g. one provisioned from configuration.
    pub fn from_plaintext(
        plaintext: impl Into<String>,
        user_id: i64,
        expiry: DateTime<Utc>,
        scope: Scope,
    ) -> Self {
        let plaintext = plaintext.into();
        Self {
            hash: hash_token(&plaintext),
            plaintext,
            expiry,
            user_id,
            scope,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(plaintext.len() == TOKEN_LENGTH, "token", "must be 26 bytes long");
}

/// Hex-encoded SHA-256 of a plaintext token.
pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// `now + ttl`, saturating at the latest representable instant.
pub fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_use_the_base32_alphabet() {
        let token = Token::generate(7, Duration::from_secs(60), Scope::Authentication);
        assert_eq!(token.plaintext.len(), TOKEN_LENGTH);
        assert!(token.plaintext.bytes().all(|b| ALPHABET.contains(&b)));
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert_eq!(token.user_id, 7);
        assert!(token.is_live(Utc::now()));
    }

    #[test]
    fn tokens_are_not_repeated() {
        let a = Token::generate(1, Duration::from_secs(60), Scope::Activation);
        let b = Token::generate(1, Duration::from_secs(60), Scope::Activation);
        assert_ne!(a.plaintext, b.plaintext);
    }

    #[test]
    fn plaintext_must_be_full_length() {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "");
        assert_eq!(v.errors()["token"], "must be provided");

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "ABC");
        assert_eq!(v.errors()["token"], "must be 26 bytes long");

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, &"A".repeat(TOKEN_LENGTH));
        assert!(v.valid());
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn zero_ttl_is_already_expired() {
        let token = Token::generate(1, Duration::ZERO, Scope::Authentication);
        assert!(!token.is_live(Utc::now()));
    }

    #[test]
    fn huge_ttl_saturates() {
        assert_eq!(expiry_after(Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn only_plaintext_and_expiry_are_serialized() {
        let token = Token::generate(1, Duration::from_secs(60), Scope::Authentication);
        let value = serde_json::to_value(&token).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["token", "expiry"]);
    }
}
