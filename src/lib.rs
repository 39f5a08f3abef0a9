//! Greenlight movies API library.
//!
//! Requests flow through a fixed pipeline before reaching a handler:
//! panic isolation, per-client rate limiting, bearer-token authentication,
//! then a per-route permission gate.

pub mod config;
pub mod data;
pub mod http;
pub mod lifecycle;
pub mod mailer;
pub mod observability;
pub mod security;
pub mod validator;

pub use config::ApiConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
