//! User accounts and the tokens issued against them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::error::StoreError;
use crate::data::tokens::{expiry_after, hash_token, Scope, Token};
use crate::security::password::{MAX_PASSWORD_BYTES, MIN_PASSWORD_BYTES};
use crate::validator::{self, Validator, EMAIL_RX};

/// A registered user as seen by the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub activated: bool,
}

/// The full account record behind a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl Account {
    pub fn user(&self) -> User {
        User {
            id: self.id,
            activated: self.activated,
        }
    }
}

/// Fields supplied when an account is registered.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(validator::matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= MIN_PASSWORD_BYTES, "password", "must be at least 8 bytes long");
    v.check(password.len() <= MAX_PASSWORD_BYTES, "password", "must not be more than 72 bytes long");
}

/// Registration checks on the raw input, before the password is hashed.
pub fn validate_registration(v: &mut Validator, name: &str, email: &str, password: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");
    validate_email(v, email);
    validate_password_plaintext(v, password);
}

/// Account records and the tokens that resolve to them.
pub trait UserStore: Send + Sync {
    /// Returns `Ok(None)` when the token is unknown or its session has
    /// expired. Callers must not be able to tell the two apart.
    fn resolve_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateEmail`] if the address is taken.
    fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Email addresses match case-insensitively.
    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// The account owning a live token of `scope`.
    fn account_for_token(&self, scope: Scope, plaintext: &str) -> Result<Option<Account>, StoreError>;

    /// Writes `account` if its version is still current, bumping the version.
    fn update_account(&self, account: Account) -> Result<Account, StoreError>;

    fn insert_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Returns how many tokens were removed.
    fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<usize, StoreError>;
}

struct StoredToken {
    user_id: i64,
    scope: Scope,
    expiry: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    tokens: HashMap<String, StoredToken>,
}

/// In-memory account table and token index, keyed by token hash.
#[derive(Default)]
pub struct MemoryUserStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `user` with a known authentication token valid for `ttl`.
    /// The account is created bare if it does not exist yet.
    pub fn provision(&self, token: &str, user: User, ttl: Duration) {
        let mut tables = self.lock();
        let account = tables.accounts.entry(user.id).or_insert_with(|| Account {
            id: user.id,
            created_at: Utc::now(),
            name: String::new(),
            email: String::new(),
            password_hash: String::new(),
            activated: user.activated,
            version: 1,
        });
        account.activated = user.activated;
        tables.tokens.insert(
            hash_token(token),
            StoredToken {
                user_id: user.id,
                scope: Scope::Authentication,
                expiry: expiry_after(ttl),
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user store offline".into()));
        }
        Ok(self.lock())
    }
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.accounts
            .values()
            .any(|a| Some(a.id) != except && !a.email.is_empty() && a.email.eq_ignore_ascii_case(email))
    }

    fn live_account(&mut self, scope: Scope, plaintext: &str) -> Result<Option<Account>, StoreError> {
        let hash = hash_token(plaintext);
        let (user_id, live) = match self.tokens.get(&hash) {
            Some(t) if t.scope == scope => (t.user_id, t.expiry > Utc::now()),
            _ => return Ok(None),
        };
        if !live {
            self.tokens.remove(&hash);
            return Ok(None);
        }
        match self.accounts.get(&user_id) {
            Some(account) => Ok(Some(account.clone())),
            None => Err(StoreError::Corrupted(format!("token for missing user {user_id}"))),
        }
    }
}

impl UserStore for MemoryUserStore {
    fn resolve_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let mut tables = self.available()?;
        Ok(tables
            .live_account(Scope::Authentication, token)?
            .map(|account| account.user()))
    }

    fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut tables = self.available()?;
        if tables.email_taken(&account.email, None) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = tables.accounts.keys().next_back().map_or(1, |last| last + 1);
        let account = Account {
            id,
            created_at: Utc::now(),
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            activated: false,
            version: 1,
        };
        tables.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.available()?;
        Ok(tables
            .accounts
            .values()
            .find(|a| !a.email.is_empty() && a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn account_for_token(&self, scope: Scope, plaintext: &str) -> Result<Option<Account>, StoreError> {
        self.available()?.live_account(scope, plaintext)
    }

    fn update_account(&self, mut account: Account) -> Result<Account, StoreError> {
        let mut tables = self.available()?;
        if tables.email_taken(&account.email, Some(account.id)) {
            return Err(StoreError::DuplicateEmail);
        }
        match tables.accounts.get_mut(&account.id) {
            Some(stored) if stored.version == account.version => {
                account.version += 1;
                *stored = account.clone();
                Ok(account)
            }
            _ => Err(StoreError::EditConflict),
        }
    }

    fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut tables = self.available()?;
        tables.tokens.insert(
            token.hash.clone(),
            StoredToken {
                user_id: token.user_id,
                scope: token.scope,
                expiry: token.expiry,
            },
        );
        Ok(())
    }

    fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<usize, StoreError> {
        let mut tables = self.available()?;
        let before = tables.tokens.len();
        tables
            .tokens
            .retain(|_, t| !(t.scope == scope && t.user_id == user_id));
        Ok(before - tables.tokens.len())
    }
}
