//! # Cache Error Types Module
//!
//! This module defines the error types shared by every stratacache crate,
//! providing standardized error handling for layer operations, codec
//! failures, and extension dispatch.
//!
//! ## Error Categories
//!
//! - **Usage**: a caller violated the API contract (empty key, empty layer
//!   list, double registration). Raised synchronously before any I/O.
//! - **Disposed**: an operation was invoked on a cache stack after
//!   `dispose()` completed.
//! - **Codec**: a value could not be serialized or deserialized.
//! - **RemoteTransaction**: a transactional batch against the remote store
//!   was not committed. Fatal for the call; no partial-state cleanup is
//!   attempted.
//! - **RemoteUnavailable**: a remote layer operation failed at the
//!   connection level. Reads degrade around this through availability
//!   checks; writes surface it to the caller.
//! - **Extension**: an extension's event handler failed, propagated out of
//!   the triggering stack call.

use thiserror::Error;

/// Convenient result alias used across the stratacache crates.
pub type CacheResult<T> = Result<T, CacheError>;

/// Comprehensive error type for cache stack operations.
///
/// Each variant carries a human-readable message describing the failing
/// operation. Reads across the stack are best-effort and usually absorb
/// layer unavailability; writes propagate the first failure.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A caller violated the API contract
    #[error("Invalid usage: {message}")]
    Usage { message: String },

    /// The cache stack was already disposed
    #[error("Cache stack has been disposed")]
    Disposed,

    /// Value serialization or deserialization failed
    #[error("Codec error: {message}")]
    Codec { message: String },

    /// A transactional batch against the remote store was rejected
    #[error("Remote transaction was not committed: {message}")]
    RemoteTransaction { message: String },

    /// A remote layer could not be reached
    #[error("Remote layer unavailable: {message}")]
    RemoteUnavailable { message: String },

    /// An extension's event handler failed
    #[error("Extension error: {message}")]
    Extension { message: String },
}

impl CacheError {
    /// Build a [`CacheError::Usage`] from any printable message.
    pub fn usage(message: impl Into<String>) -> Self {
        CacheError::Usage {
            message: message.into(),
        }
    }

    /// Build a [`CacheError::Codec`] from any printable message.
    pub fn codec(message: impl Into<String>) -> Self {
        CacheError::Codec {
            message: message.into(),
        }
    }

    /// Build a [`CacheError::Extension`] from any printable message.
    pub fn extension(message: impl Into<String>) -> Self {
        CacheError::Extension {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec {
            message: err.to_string(),
        }
    }
}
