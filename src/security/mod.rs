//! Security stages of the request pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, 429 when empty)
//!     → authentication.rs (bearer token → Identity)
//!     → router
//!     → authorization.rs (per-route permission gate)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before any store lookup
//! - Bad credentials of every kind share one 401 message
//! - Authorization failures are distinguishable (account state is not secret)
//! - Passwords are stored as Argon2id PHC strings (password.rs)

pub mod authentication;
pub mod authorization;
pub mod password;
pub mod rate_limit;

pub use authentication::{authenticate, AuthState, Identity};
pub use authorization::{require_permission, PermissionGate};
pub use password::{hash_password, verify_password, PasswordError};
pub use rate_limit::{rate_limit, RateLimiter};
