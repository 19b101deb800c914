//! Blob store abstraction for persisted token cache state.
//!
//! This crate defines the [`BlobStore`] contract a token cache persists
//! through: opaque byte payloads keyed by strings, each write carrying
//! [`ExpirationOptions`]. Hosting environments supply their own store
//! (distributed cache, database table, KV namespace); [`MemoryBlobStore`]
//! is the in-process reference implementation.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use tokencache_storage::{BlobStore, ExpirationOptions, MemoryBlobStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryBlobStore::new();
//!     let options = ExpirationOptions::absolute(Duration::from_secs(3600));
//!
//!     store.set("account-1", Bytes::from_static(b"serialized cache"), &options).await?;
//!     let payload = store.get("account-1").await?;
//!     assert_eq!(payload.as_deref(), Some(&b"serialized cache"[..]));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Stores map their internal
//! failures to [`StorageError`] variants and never retry on the caller's
//! behalf.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a fault-injecting, call-counting store and
//!   payload generators.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod expiration;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use backend::BlobStore;
pub use error::{BoxError, StorageError, StorageResult};
pub use expiration::ExpirationOptions;
pub use memory::MemoryBlobStore;
