//! Authentication error types.
//!
//! [`AuthError`] covers authority resolution and token cache persistence.
//! [`MetadataError`] describes why a metadata document could not be obtained
//! and is carried as the source of [`AuthError::MetadataUnavailable`].

use std::sync::Arc;

use thiserror::Error;
use tokencache_storage::{BoxError, StorageError};

/// Errors surfaced by the resolver and the token cache adapter.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Caller supplied an empty or missing argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The authority's metadata could not be fetched or was unusable.
    ///
    /// Nothing is cached for the authority, so the next call retries.
    #[error("Metadata unavailable for {url}")]
    MetadataUnavailable {
        /// Metadata document URL that was requested.
        url: String,
        /// Why the document could not be used. Shared between all callers
        /// that waited on the same fetch.
        #[source]
        source: Arc<MetadataError>,
    },

    /// A blob store operation failed.
    ///
    /// Wraps the original [`StorageError`] unmodified so callers can inspect
    /// it (for instance via [`StorageError::is_transient`]).
    #[error("Token cache storage error: {0}")]
    Store(#[source] StorageError),

    /// Invalid configuration detected at construction time.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a new `MetadataUnavailable` error.
    #[must_use]
    pub fn metadata_unavailable(url: impl Into<String>, source: Arc<MetadataError>) -> Self {
        Self::MetadataUnavailable { url: url.into(), source }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Store(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Reasons a metadata document could not be obtained or used.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetadataError {
    /// The request never produced a response.
    #[error("Metadata request failed: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying client error.
        #[source]
        source: Option<BoxError>,
    },

    /// The request did not complete in time.
    #[error("Metadata request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("Metadata endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body exceeded the configured size limit.
    #[error("Metadata document exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The body was not a usable metadata document.
    #[error("Invalid metadata document: {message}")]
    InvalidDocument {
        /// Description of the decode failure.
        message: String,
        /// The underlying decode error.
        #[source]
        source: Option<BoxError>,
    },

    /// The document's `issuer` is not an absolute URL with a host.
    #[error("Invalid issuer {issuer:?}: {message}")]
    InvalidIssuer {
        /// The issuer value found in the document.
        issuer: String,
        /// Why it was rejected.
        message: String,
    },
}

impl MetadataError {
    /// Creates a new `Transport` error with a message and source error.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Transport` error with the given message.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Creates a new `InvalidDocument` error with a message and source error.
    #[must_use]
    pub fn invalid_document_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InvalidDocument { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `InvalidIssuer` error.
    #[must_use]
    pub fn invalid_issuer(issuer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIssuer { issuer: issuer.into(), message: message.into() }
    }
}
