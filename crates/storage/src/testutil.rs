//! Shared test utilities for blob store consumers.
//!
//! Feature-gated behind `testutil` so the helpers never ship in production
//! builds. Enable it from a dependent crate's `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! tokencache-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    backend::BlobStore,
    error::{StorageError, StorageResult},
    expiration::ExpirationOptions,
    memory::MemoryBlobStore,
};

/// Create a payload of `size` bytes with a repeating, position-dependent
/// pattern so truncation or reordering is detectable byte-for-byte.
#[must_use]
pub fn make_payload(size: usize) -> Bytes {
    (0..size).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
}

/// Factory producing the error a [`FaultyBlobStore`] should return.
pub type ErrorFactory = fn() -> StorageError;

/// A [`BlobStore`] wrapper around [`MemoryBlobStore`] that counts calls and
/// can be switched into a failing mode.
///
/// Calls are counted even when they fail, which lets tests assert that a
/// caller did not retry.
pub struct FaultyBlobStore {
    inner: MemoryBlobStore,
    fail_with: Mutex<Option<ErrorFactory>>,
    last_options: Mutex<Option<ExpirationOptions>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
}

impl FaultyBlobStore {
    /// Creates a healthy store backed by a fresh [`MemoryBlobStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::wrap(MemoryBlobStore::new())
    }

    /// Wraps an existing in-memory store.
    #[must_use]
    pub fn wrap(inner: MemoryBlobStore) -> Self {
        Self {
            inner,
            fail_with: Mutex::new(None),
            last_options: Mutex::new(None),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent operation fail with `factory()`, or restores
    /// normal behaviour with `None`.
    pub fn set_failure(&self, factory: Option<ErrorFactory>) {
        *self.fail_with.lock() = factory;
    }

    /// The wrapped store, for seeding or inspecting state directly.
    #[must_use]
    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }

    /// Expiration options passed to the most recent `set` call.
    #[must_use]
    pub fn last_options(&self) -> Option<ExpirationOptions> {
        *self.last_options.lock()
    }

    /// Number of `get` calls observed.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls observed.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls observed.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> StorageResult<()> {
        match *self.fail_with.lock() {
            Some(factory) => Err(factory()),
            None => Ok(()),
        }
    }
}

impl Default for FaultyBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, options: &ExpirationOptions) -> StorageResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(*options);
        self.check_failure()?;
        self.inner.set(key, value, options).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.inner.delete(key).await
    }
}
