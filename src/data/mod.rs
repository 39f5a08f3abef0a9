//! Data models and the store interfaces the request pipeline consults.
//!
//! # Data Flow
//! ```text
//! authentication stage → users.rs (token → User)
//! account handlers     → users.rs + tokens.rs (register, activate, sign in)
//! permission gate      → permissions.rs (User id → Permissions)
//! movie handlers       → movies.rs (CRUD, validation)
//! ```
//!
//! The stores are in-memory. A relational backend would implement the same
//! traits; nothing above this module depends on how lookups are answered.

pub mod error;
pub mod movies;
pub mod permissions;
pub mod tokens;
pub mod users;

pub use error::StoreError;
pub use movies::{Movie, MovieInput, MovieStore, Runtime};
pub use permissions::{MemoryPermissionStore, Permission, PermissionStore, Permissions};
pub use tokens::{Scope, Token};
pub use users::{Account, MemoryUserStore, NewAccount, User, UserStore};
