//! # Token Cache Authentication Support
//!
//! Issuer resolution and token cache persistence for services that validate
//! and cache tokens from multi-tenant identity providers.
//!
//! This crate provides:
//! - **Authority resolution**: [`AuthorityResolver`] maps an authority URL to the issuer
//!   authorities its tokens may carry, fetching the provider's discovery document once per host
//! - **Token cache persistence**: [`TokenCacheAdapter`] stores serialized per-account token
//!   caches in any [`BlobStore`](tokencache_storage::BlobStore)
//!
//! ## Features
//!
//! - Concurrent first lookups for a host share a single metadata fetch
//! - Fetch failures are never cached; no issuer is accepted without a successful fetch
//! - Optional in-process L1 cache in front of the blob store
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use tokencache_authn::{
//!     AuthorityResolver, AuthorityResolverConfig, HttpMetadataFetcher, TokenCacheAdapter,
//!     TokenCacheOptions,
//! };
//! use tokencache_storage::MemoryBlobStore;
//!
//! # async fn example() -> Result<(), tokencache_authn::AuthError> {
//! let fetcher = Arc::new(HttpMetadataFetcher::new(reqwest::Client::new()));
//! let resolver = AuthorityResolver::new(fetcher, AuthorityResolverConfig::default())?;
//! let entry = resolver.resolve("https://login.example.com/tenant-abc/").await?;
//! assert!(entry.accepted_issuers().contains("login.example.com"));
//!
//! let adapter =
//!     TokenCacheAdapter::new(Arc::new(MemoryBlobStore::new()), TokenCacheOptions::default())?;
//! adapter.write("account-1", Bytes::from_static(b"serialized cache")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with an in-memory metadata fetcher and
//!   re-exports of the storage crate's fault-injecting store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Authority issuer resolution.
pub mod authority;
/// Configuration types.
pub mod config;
/// Authentication error types.
pub mod error;
/// Provider discovery document fetching.
pub mod metadata;
/// Token cache persistence.
pub mod token_cache;

/// Shared test utilities.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export key types for convenience
pub use authority::{AuthorityEntry, AuthorityResolver, metadata_url};
pub use config::{
    AuthorityResolverConfig, DEFAULT_AUTHORITY, HttpFetcherConfig, L1CacheOptions,
    TokenCacheOptions,
};
pub use error::{AuthError, MetadataError, Result};
pub use metadata::{HttpMetadataFetcher, MetadataFetcher, OpenIdConfiguration};
pub use token_cache::TokenCacheAdapter;
