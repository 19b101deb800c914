//! Token cache persistence adapter.
//!
//! [`TokenCacheAdapter`] connects an identity library's serialized per-account
//! token cache to a [`BlobStore`]. Payloads are opaque: they are stored and
//! returned byte-for-byte and never inspected.
//!
//! # Cache Strategy
//!
//! - **L2**: the [`BlobStore`], always authoritative; every write carries the adapter's
//!   [`ExpirationOptions`]
//! - **L1** (optional): an in-process moka cache bounded by total payload bytes and a TTL
//! - **Reads**: an L1 miss reads the store and fills L1, unless a write or remove touched the
//!   key while the store read was in flight
//! - **Writes and removes**: evict L1 before and after the store call; the next read refills it
//!
//! Writes never fill L1 themselves: with two concurrent writers the adapter
//! cannot tell which payload the store kept.
//!
//! Reads served from L1 do not reach the store, so they do not renew a
//! sliding expiration there. Keep the L1 lifetime well below the sliding
//! window.

use std::{
    hash::{BuildHasher, RandomState},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use moka::future::Cache;
use tokencache_storage::{BlobStore, ExpirationOptions};

use crate::{
    config::{L1CacheOptions, TokenCacheOptions},
    error::{AuthError, Result},
};

/// Number of generation counters shared by all keys.
const GENERATION_STRIPES: usize = 64;

/// Persists serialized token caches, one payload per account key.
///
/// Safe for concurrent use. Operations on different keys never interfere;
/// concurrent writes to the same key resolve as the store resolves them
/// (last writer wins for [`MemoryBlobStore`](tokencache_storage::MemoryBlobStore)).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use tokencache_authn::{TokenCacheAdapter, TokenCacheOptions};
/// use tokencache_storage::MemoryBlobStore;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let adapter =
///     TokenCacheAdapter::new(Arc::new(MemoryBlobStore::new()), TokenCacheOptions::default())?;
///
/// adapter.write("account-1", Bytes::from_static(b"serialized cache")).await?;
/// assert_eq!(adapter.read("account-1").await?, Some(Bytes::from_static(b"serialized cache")));
/// # Ok::<(), tokencache_authn::AuthError>(())
/// # }).unwrap();
/// ```
pub struct TokenCacheAdapter {
    store: Arc<dyn BlobStore>,
    expiration: ExpirationOptions,
    l1: Option<L1Layer>,
}

impl TokenCacheAdapter {
    /// Creates an adapter over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `options` fails validation.
    pub fn new(store: Arc<dyn BlobStore>, options: TokenCacheOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { store, expiration: options.expiration, l1: options.l1_cache.map(L1Layer::new) })
    }

    /// Deletes the payload stored under `key`. Removing an absent key
    /// succeeds.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidArgument`] if `key` is empty
    /// - [`AuthError::Store`] if the store delete fails
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        tracing::debug!("token cache remove started");

        if let Some(l1) = &self.l1 {
            l1.cache.invalidate(key).await;
        }
        let result = self.store.delete(key).await;
        if let Some(l1) = &self.l1 {
            l1.mark_changed(key).await;
        }
        result?;

        tracing::debug!("token cache remove completed");
        Ok(())
    }

    /// Returns the payload stored under `key`, or `None` if it was never
    /// written, was removed, or has expired.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidArgument`] if `key` is empty
    /// - [`AuthError::Store`] if the store read fails
    #[tracing::instrument(skip(self))]
    pub async fn read(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        tracing::debug!("token cache read started");

        let payload = match &self.l1 {
            None => self.store.get(key).await?,
            Some(l1) => {
                if let Some(payload) = l1.cache.get(key).await {
                    tracing::debug!(
                        bytes = payload.len(),
                        l1_hit = true,
                        "token cache read completed"
                    );
                    return Ok(Some(payload));
                }

                let generation = l1.generation(key);
                let payload = self.store.get(key).await?;
                if let Some(payload) = &payload {
                    l1.fill(key, generation, payload.clone()).await;
                }
                payload
            },
        };

        tracing::debug!(
            bytes = payload.as_ref().map_or(0, Bytes::len),
            found = payload.is_some(),
            "token cache read completed"
        );
        Ok(payload)
    }

    /// Stores `payload` under `key`, fully replacing any previous payload
    /// and applying the adapter's expiration options.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidArgument`] if `key` is empty
    /// - [`AuthError::Store`] if the store rejects the write
    #[tracing::instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn write(&self, key: &str, payload: Bytes) -> Result<()> {
        validate_key(key)?;
        tracing::debug!(bytes = payload.len(), "token cache write started");

        let len = payload.len();
        if let Some(l1) = &self.l1 {
            l1.cache.invalidate(key).await;
        }
        let result = self.store.set(key, payload, &self.expiration).await;
        if let Some(l1) = &self.l1 {
            l1.mark_changed(key).await;
        }
        if let Err(e) = result {
            tracing::warn!(error = %e, "token cache write failed");
            return Err(e.into());
        }

        tracing::debug!(bytes = len, "token cache write completed");
        Ok(())
    }

    /// Expiration options applied to every write.
    #[must_use]
    pub fn expiration(&self) -> &ExpirationOptions {
        &self.expiration
    }

    /// Whether the in-process L1 layer is enabled.
    #[must_use]
    pub fn l1_enabled(&self) -> bool {
        self.l1.is_some()
    }
}

impl std::fmt::Debug for TokenCacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCacheAdapter")
            .field("expiration", &self.expiration)
            .field("l1_entries", &self.l1.as_ref().map(|l1| l1.cache.entry_count()))
            .finish_non_exhaustive()
    }
}

/// In-process cache in front of the store.
///
/// Every write or remove bumps its key's generation once the store call has
/// returned. A read captures the generation before going to the store and
/// only keeps its L1 fill if the generation is unchanged afterwards, so a
/// payload read before a completed remove never lands in L1. Keys share
/// striped counters; a collision only costs a skipped fill.
struct L1Layer {
    cache: Cache<String, Bytes>,
    generations: [AtomicU64; GENERATION_STRIPES],
    hasher: RandomState,
}

impl L1Layer {
    fn new(options: L1CacheOptions) -> Self {
        let cache = Cache::builder()
            .max_capacity(options.size_limit)
            .weigher(|key: &String, payload: &Bytes| {
                u32::try_from(key.len() + payload.len()).unwrap_or(u32::MAX)
            })
            .time_to_live(options.time_to_live)
            .build();
        Self {
            cache,
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
            hasher: RandomState::new(),
        }
    }

    fn stripe(&self, key: &str) -> &AtomicU64 {
        let index = (self.hasher.hash_one(key) % GENERATION_STRIPES as u64) as usize;
        &self.generations[index]
    }

    fn generation(&self, key: &str) -> u64 {
        self.stripe(key).load(Ordering::SeqCst)
    }

    /// Records that `key` changed in the store and drops any L1 copy.
    async fn mark_changed(&self, key: &str) {
        self.stripe(key).fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(key).await;
    }

    /// Caches `payload` read from the store at `generation`, unless `key`
    /// changed since.
    async fn fill(&self, key: &str, generation: u64, payload: Bytes) {
        if self.generation(key) != generation {
            return;
        }
        self.cache.insert(key.to_owned(), payload).await;
        // A change that raced the insert may have evicted before it landed.
        if self.generation(key) != generation {
            self.cache.invalidate(key).await;
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AuthError::invalid_argument("token cache key must not be empty"));
    }
    Ok(())
}
