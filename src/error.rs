//! Error types.
//!
//! Precondition violations are reported synchronously by the call that
//! violates them. Nothing on the asynchronous completion path can fail.

use thiserror::Error;

/// Errors reported by timer construction and one-shot waits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A duration was missing, malformed, or infinite where a finite wait
    /// is required.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates an invalid-argument error with the given message.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns `true` if this is an invalid-argument error.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
