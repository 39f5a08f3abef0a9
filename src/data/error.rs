//! Errors raised by store collaborators.

use thiserror::Error;

/// Failure of a backing store lookup or mutation.
///
/// "Record not found" is not an error at this level; lookups return
/// `Option` for that. Apart from the conflict variants, anything surfacing
/// as a `StoreError` is a server-side fault and maps to a 500.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Another account already uses the email address.
    #[error("duplicate email")]
    DuplicateEmail,

    /// The record changed underneath the caller (optimistic concurrency).
    #[error("edit conflict")]
    EditConflict,

    /// Internal bookkeeping was found inconsistent.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}
