//! Permission codes, permission sets, and the permission store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::data::error::StoreError;

/// Permission codes checked at route boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "movies:read")]
    MoviesRead,

    #[serde(rename = "movies:write")]
    MoviesWrite,
}

impl Permission {
    /// The wire code stored against users.
    pub const fn code(self) -> &'static str {
        match self {
            Permission::MoviesRead => "movies:read",
            Permission::MoviesWrite => "movies:write",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "movies:read" => Some(Permission::MoviesRead),
            "movies:write" => Some(Permission::MoviesWrite),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The set of permission codes granted to one user.
///
/// Codes are opaque strings; membership is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Lookup of permission sets by user id.
///
/// Implementations are called synchronously from the request's task and
/// must apply their own per-call timeout.
pub trait PermissionStore: Send + Sync {
    fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;

    fn grant_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

/// In-memory permission store.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    grants: Mutex<HashMap<i64, HashSet<String>>>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `permissions_for_user` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Simulate an outage: every lookup fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("permission store offline".into()));
        }

        let grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(grants
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn grant_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("permission store offline".into()));
        }

        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        grants
            .entry(user_id)
            .or_default()
            .extend(codes.iter().map(|c| c.to_string()));
        tracing::debug!(user_id, codes = ?codes, "Permissions granted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact_and_case_sensitive() {
        let perms: Permissions = ["movies:read"].into_iter().collect();
        assert!(perms.contains("movies:read"));
        assert!(!perms.contains("Movies:Read"));
        assert!(!perms.contains("movies:rea"));
        assert!(!perms.contains("movies:write"));
    }

    #[test]
    fn codes_round_trip_through_enum() {
        for p in [Permission::MoviesRead, Permission::MoviesWrite] {
            assert_eq!(Permission::from_code(p.code()), Some(p));
        }
        assert_eq!(Permission::from_code("movies:delete"), None);
    }

    #[test]
    fn grants_accumulate_and_lookups_are_counted() {
        let store = MemoryPermissionStore::new();
        store.grant_permissions(7, &["movies:read"]).unwrap();
        store.grant_permissions(7, &["movies:write"]).unwrap();

        let perms = store.permissions_for_user(7).unwrap();
        assert_eq!(perms.len(), 2);
        assert!(store.permissions_for_user(8).unwrap().is_empty());
        assert_eq!(store.lookup_count(), 2);
    }

    #[test]
    fn outage_surfaces_as_store_error() {
        let store = MemoryPermissionStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.permissions_for_user(1),
            Err(StoreError::Unavailable(_))
        ));
    }
}
