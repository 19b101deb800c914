//! Storage error types and result alias.
//!
//! Every [`BlobStore`](crate::BlobStore) implementation maps its internal
//! failures onto [`StorageError`]. Callers above the store never retry on
//! their own; [`StorageError::is_transient`] exists so that a store (or a
//! wrapper around one) can make that decision.
//!
//! # Example
//!
//! ```
//! use tokencache_storage::{StorageError, StorageResult};
//!
//! fn connect(endpoint: &str) -> StorageResult<()> {
//!     Err(StorageError::connection(format!("{endpoint} refused the connection")))
//! }
//!
//! assert!(connect("cache:6379").unwrap_err().is_transient());
//! ```

use std::{sync::Arc, time::Duration};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during blob store operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// debugging tools to display the full error context.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Connection or network error.
    ///
    /// The store could not be reached: connection refused, DNS failure,
    /// dropped session.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Serialization or deserialization error inside the store.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// The store refused the write because a size or quota limit was hit.
    #[error("Quota exceeded for key {key}: {size} bytes exceeds limit of {limit} bytes")]
    QuotaExceeded {
        /// Key that was being written.
        key: String,
        /// Size of the rejected value in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// An expiration option carried a zero duration.
    #[error("Invalid expiration: {field} must be greater than zero, got {value:?}")]
    InvalidExpiration {
        /// Name of the offending option.
        field: &'static str,
        /// The rejected value.
        value: Duration,
    },

    /// Internal store error that doesn't fit the other categories.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `QuotaExceeded` error.
    #[must_use]
    pub fn quota_exceeded(key: impl Into<String>, size: usize, limit: usize) -> Self {
        Self::QuotaExceeded { key: key.into(), size, limit }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` for failures that may succeed if the same operation is
    /// attempted again later (connection loss and timeouts).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}
