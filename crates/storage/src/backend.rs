//! Blob store trait definition.
//!
//! [`BlobStore`] is the narrow key-value contract the token cache adapter
//! persists through. It is supplied by the hosting environment (a distributed
//! cache, a database table, a KV namespace); [`MemoryBlobStore`](crate::MemoryBlobStore)
//! is the in-process reference implementation.
//!
//! # Design
//!
//! - **Keys are strings, values are bytes**: payloads are opaque and never interpreted here.
//! - **Expiration belongs to the store**: writes carry [`ExpirationOptions`]; entries that expire
//!   simply read back as absent.
//! - **No retries**: failures surface as [`StorageError`](crate::StorageError) and the caller
//!   decides.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, expiration::ExpirationOptions};

/// Abstract key to byte-sequence store with per-entry expiration.
///
/// Implementations must be safe for concurrent use (`Send + Sync`) and keep
/// keys strictly isolated: an operation on one key never observes or alters
/// another.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](BlobStore::get) | Retrieve the payload stored under a key |
/// | [`set`](BlobStore::set) | Store or fully replace a payload with expiration options |
/// | [`delete`](BlobStore::delete) | Remove a key (idempotent) |
/// | [`refresh`](BlobStore::refresh) | Renew a key's sliding expiration |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use tokencache_storage::{BlobStore, ExpirationOptions, MemoryBlobStore};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = MemoryBlobStore::new();
///
/// store.set("account-1", Bytes::from_static(b"state"), &ExpirationOptions::never()).await.unwrap();
/// assert_eq!(store.get("account-1").await.unwrap(), Some(Bytes::from_static(b"state")));
///
/// store.delete("account-1").await.unwrap();
/// assert_eq!(store.get("account-1").await.unwrap(), None);
/// # });
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Retrieves the payload stored under `key`.
    ///
    /// Reading an entry renews its sliding expiration, if it has one.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists and has not expired
    /// - `Ok(None)` if the key doesn't exist or has expired
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Stores `value` under `key`, replacing any previous payload and
    /// expiration entirely.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: &str, value: Bytes, options: &ExpirationOptions) -> StorageResult<()>;

    /// Deletes `key`.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Renews the sliding expiration of `key` without returning its payload.
    ///
    /// The default implementation performs a [`get`](BlobStore::get) and
    /// discards the value. Stores with a native touch operation should
    /// override it.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn refresh(&self, key: &str) -> StorageResult<()> {
        self.get(key).await.map(|_| ())
    }
}
