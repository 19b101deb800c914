//! Provider metadata retrieval.
//!
//! The resolver obtains discovery documents through the [`MetadataFetcher`]
//! trait so the transport (and any HTTP caching it does) stays outside this
//! crate. [`HttpMetadataFetcher`] is the `reqwest` implementation over a
//! caller-supplied client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{config::HttpFetcherConfig, error::MetadataError};

/// The subset of an OpenID Connect discovery document this crate consumes.
///
/// Unknown fields are ignored; only `issuer` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    /// Canonical issuer URL of the provider.
    pub issuer: String,

    /// JWKS location, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

impl OpenIdConfiguration {
    /// Creates a document carrying only an issuer.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into(), jwks_uri: None }
    }
}

/// Source of provider discovery documents.
///
/// Implementations may cache or refresh internally; the resolver treats each
/// call as "return a document or fail".
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetches and decodes the discovery document at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`MetadataError`] describing the transport or decode failure.
    async fn fetch(&self, url: &str) -> Result<OpenIdConfiguration, MetadataError>;
}

/// [`MetadataFetcher`] that performs a plain HTTP GET with `reqwest`.
///
/// Redirect, proxy and timeout policy come from the supplied client. The
/// fetcher adds a status check and a response size cap.
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    config: HttpFetcherConfig,
}

impl HttpMetadataFetcher {
    /// Creates a fetcher using `client` and default limits.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_config(client, HttpFetcherConfig::default())
    }

    /// Creates a fetcher using `client` and the given limits.
    #[must_use]
    pub fn with_config(client: reqwest::Client, config: HttpFetcherConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<OpenIdConfiguration, MetadataError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MetadataError::Timeout
            } else {
                MetadataError::transport_with_source("request failed", e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status { status: status.as_u16() });
        }

        let limit = self.config.max_response_size;
        if let Some(length) = response.content_length()
            && length > limit as u64
        {
            return Err(MetadataError::ResponseTooLarge { limit });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MetadataError::transport_with_source("failed to read response body", e))?;
        if body.len() > limit {
            return Err(MetadataError::ResponseTooLarge { limit });
        }

        let document: OpenIdConfiguration = serde_json::from_slice(&body)
            .map_err(|e| MetadataError::invalid_document_with_source(e.to_string(), e))?;

        tracing::debug!(issuer = %document.issuer, "fetched metadata document");
        Ok(document)
    }
}
