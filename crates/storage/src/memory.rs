//! In-memory blob store implementation.
//!
//! [`MemoryBlobStore`] keeps payloads in a `HashMap` behind a
//! [`parking_lot::RwLock`] and enforces both absolute and sliding expiration.
//! It is intended for tests, development, and single-process deployments.
//!
//! # Expiration
//!
//! Expired entries are never returned: reads check deadlines lazily, and a
//! background task sweeps expired entries once per second so memory is
//! reclaimed even for keys nobody reads again. Deadlines use
//! [`tokio::time::Instant`], so tests can drive them with a paused clock.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use tokencache_storage::{BlobStore, ExpirationOptions, MemoryBlobStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryBlobStore::new();
//!     let options = ExpirationOptions::sliding(Duration::from_secs(3600));
//!
//!     store.set("account-1", Bytes::from_static(b"state"), &options).await.unwrap();
//!     assert!(store.get("account-1").await.unwrap().is_some());
//! }
//! ```

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::{
    select,
    sync::watch,
    time::{Instant, sleep},
};

use crate::{
    backend::BlobStore,
    error::{StorageError, StorageResult},
    expiration::ExpirationOptions,
};

/// Interval between background sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the sweep task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// A stored payload with its resolved deadlines.
#[derive(Debug, Clone)]
struct StoredBlob {
    value: Bytes,
    absolute_deadline: Option<Instant>,
    sliding_window: Option<Duration>,
    sliding_deadline: Option<Instant>,
}

impl StoredBlob {
    fn new(value: Bytes, options: &ExpirationOptions, now: Instant) -> Self {
        Self {
            value,
            absolute_deadline: options.absolute_expiration.map(|ttl| now + ttl),
            sliding_window: options.sliding_expiration,
            sliding_deadline: options.sliding_expiration.map(|window| now + window),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.absolute_deadline.is_some_and(|deadline| deadline <= now)
            || self.sliding_deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Renews the sliding window. The absolute deadline still applies
    /// independently, so a renewed entry never outlives it.
    fn touch(&mut self, now: Instant) {
        if let Some(window) = self.sliding_window {
            self.sliding_deadline = Some(now + window);
        }
    }
}

/// In-memory [`BlobStore`] with absolute and sliding expiration.
///
/// # Cloning
///
/// `MemoryBlobStore` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data.
///
/// # Shutdown
///
/// The background sweep task stops automatically when all clones are
/// dropped. [`shutdown`](Self::shutdown) stops it explicitly.
#[derive(Clone)]
pub struct MemoryBlobStore {
    data: Arc<RwLock<HashMap<String, StoredBlob>>>,
    max_value_size: Option<usize>,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl MemoryBlobStore {
    /// Creates an empty store without a value size limit.
    ///
    /// Spawns the background sweep task, so this must be called from within
    /// a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty store that rejects values larger than
    /// `max_value_size` bytes with [`StorageError::QuotaExceeded`].
    #[must_use]
    pub fn with_max_value_size(max_value_size: usize) -> Self {
        Self::build(Some(max_value_size))
    }

    fn build(max_value_size: Option<usize>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let store = Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            max_value_size,
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task holds only the data map, not a full clone, so dropping the
        // last store handle drops the guard and stops the task.
        let data = Arc::clone(&store.data);
        tokio::spawn(async move {
            sweep_expired(data, shutdown_rx).await;
        });

        store
    }

    /// Signals the background sweep task to stop.
    ///
    /// Reads still honour expiration after shutdown; only the proactive
    /// reclamation stops.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Number of entries currently held, including expired entries that
    /// have not been swept yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("entries", &self.len())
            .field("max_value_size", &self.max_value_size)
            .finish_non_exhaustive()
    }
}

async fn sweep_expired(
    data: Arc<RwLock<HashMap<String, StoredBlob>>>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    loop {
        select! {
            _ = sleep(SWEEP_INTERVAL) => {}
            _ = shutdown_rx.changed() => {
                return;
            }
        }

        let now = Instant::now();
        let mut guard = data.write();
        let before = guard.len();
        guard.retain(|_, blob| !blob.is_expired(now));
        let swept = before - guard.len();
        if swept > 0 {
            tracing::trace!(swept, "removed expired blobs");
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let now = Instant::now();

        // Fast path: entries without a sliding window need no mutation.
        {
            let data = self.data.read();
            match data.get(key) {
                None => return Ok(None),
                Some(blob) if blob.sliding_window.is_none() && !blob.is_expired(now) => {
                    return Ok(Some(blob.value.clone()));
                },
                Some(_) => {},
            }
        }

        let mut data = self.data.write();
        let Some(blob) = data.get_mut(key) else {
            return Ok(None);
        };
        if blob.is_expired(now) {
            data.remove(key);
            return Ok(None);
        }
        blob.touch(now);
        Ok(Some(blob.value.clone()))
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: Bytes, options: &ExpirationOptions) -> StorageResult<()> {
        options.validate()?;
        if let Some(limit) = self.max_value_size
            && value.len() > limit
        {
            return Err(StorageError::quota_exceeded(key, value.len(), limit));
        }

        let blob = StoredBlob::new(value, options, Instant::now());
        self.data.write().insert(key.to_owned(), blob);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn refresh(&self, key: &str) -> StorageResult<()> {
        let now = Instant::now();
        let mut data = self.data.write();
        let Some(blob) = data.get_mut(key) else {
            return Ok(());
        };
        if blob.is_expired(now) {
            data.remove(key);
        } else {
            blob.touch(now);
        }
        Ok(())
    }
}
