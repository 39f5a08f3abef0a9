//! Field-level validation accumulator.
//!
//! Handlers run a series of checks against a decoded value; failures are
//! collected per field and returned to the client as a 422 detail map.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::sync::LazyLock;

use regex::Regex;

/// Addresses of the form `local@domain`, with RFC 5322 local-part characters.
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("Invalid regex pattern for email addresses")
});

/// Collects validation failures keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no check has failed.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `key` unless that key already failed.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// True when every element of `values` is distinct.
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_key_wins() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "title", "must not be more than 500 bytes long");
        v.check(true, "year", "must be provided");

        assert!(!v.valid());
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors()["title"], "must be provided");
    }

    #[test]
    fn unique_detects_duplicates() {
        assert!(unique(&["drama", "comedy"]));
        assert!(!unique(&["drama", "drama"]));
        assert!(unique::<&str>(&[]));
    }

    #[test]
    fn email_pattern() {
        assert!(matches("alice@example.com", &EMAIL_RX));
        assert!(matches("a.b+tag@sub.example.co", &EMAIL_RX));
        for bad in ["", "alice", "alice@", "@example.com", "alice@-example.com", "a b@example.com"] {
            assert!(!matches(bad, &EMAIL_RX), "{bad:?}");
        }
    }
}
