//! Shared test utilities for authority resolution and token cache tests.
//!
//! Feature-gated behind `testutil` so the helpers never ship in production
//! builds. Enable it in an integration test's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tokencache-authn = { path = "../authn", features = ["testutil"] }
//! ```

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    authority::metadata_url,
    error::MetadataError,
    metadata::{MetadataFetcher, OpenIdConfiguration},
};

pub use tokencache_storage::testutil::{FaultyBlobStore, make_payload};

/// Factory producing the error a [`StaticMetadataFetcher`] should return.
pub type MetadataErrorFactory = fn() -> MetadataError;

/// An in-memory [`MetadataFetcher`] serving canned documents by URL.
///
/// Every call is counted and recorded, including failing ones, so tests can
/// assert how many network round trips a caller would have made. Unknown
/// URLs fail with HTTP 404.
#[derive(Default)]
pub struct StaticMetadataFetcher {
    documents: Mutex<HashMap<String, OpenIdConfiguration>>,
    requests: Mutex<Vec<String>>,
    fail_with: Mutex<Option<MetadataErrorFactory>>,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl StaticMetadataFetcher {
    /// Creates a fetcher with no documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a document with `issuer` at the metadata URL of `host_key`.
    pub fn insert_issuer(&self, host_key: &str, issuer: &str) {
        self.insert_document(metadata_url(host_key), OpenIdConfiguration::new(issuer));
    }

    /// Serves `document` at `url`.
    pub fn insert_document(&self, url: impl Into<String>, document: OpenIdConfiguration) {
        self.documents.lock().insert(url.into(), document);
    }

    /// Makes every subsequent fetch fail with `factory()`, or restores
    /// normal behaviour with `None`.
    pub fn set_failure(&self, factory: Option<MetadataErrorFactory>) {
        *self.fail_with.lock() = factory;
    }

    /// Delays every fetch by `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of fetches performed so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in call order.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MetadataFetcher for StaticMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<OpenIdConfiguration, MetadataError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(url.to_owned());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.fail_with.lock();
        if let Some(factory) = failure {
            return Err(factory());
        }

        self.documents.lock().get(url).cloned().ok_or(MetadataError::Status { status: 404 })
    }
}
