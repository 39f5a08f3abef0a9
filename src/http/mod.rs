//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, outer layers: request ID, trace, metrics)
//!     → pipeline.rs (recover → rate limit → authenticate)
//!     → route table + per-route permission gate
//!     → handlers.rs, accounts.rs (json.rs decodes the body, encodes the envelope)
//!     → response.rs (errors become {"error": ...} envelopes)
//! ```

pub mod accounts;
pub mod handlers;
pub mod json;
pub mod pipeline;
pub mod recover;
pub mod request;
pub mod response;
pub mod server;

pub use json::{Envelope, StrictJson};
pub use pipeline::{Pipeline, PipelineError, StageKind};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
