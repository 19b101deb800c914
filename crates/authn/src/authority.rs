//! Authority issuer resolution.
//!
//! [`AuthorityResolver`] maps an authority URL to the set of issuer
//! authorities a token from that authority may carry. Results are memoized
//! per host for the life of the process.
//!
//! # Architecture
//!
//! ```text
//! authority URL → normalize to host[:port] (fallback: default authority host)
//!               → check cache
//!               → miss? fetch https://{host}/common/.well-known/openid-configuration
//!                       (one fetch per host, concurrent callers wait on it)
//!               → issuer URL → its authority is the accepted issuer
//!               → cache and return
//! ```
//!
//! A failed fetch caches nothing, so the next call for the same host fetches
//! again. No issuer is ever accepted without a successful fetch.

use std::{collections::HashSet, sync::Arc};

use moka::future::Cache;
use url::Url;

use crate::{
    config::AuthorityResolverConfig,
    error::{AuthError, MetadataError, Result},
    metadata::MetadataFetcher,
};

/// Issuers accepted for one authority host.
///
/// Immutable once constructed; shared between callers as
/// `Arc<AuthorityEntry>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityEntry {
    host_key: String,
    accepted_issuers: HashSet<String>,
}

impl AuthorityEntry {
    /// Creates an entry for `host_key` accepting `accepted_issuers`.
    #[must_use]
    pub fn new(
        host_key: impl Into<String>,
        accepted_issuers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            host_key: host_key.into(),
            accepted_issuers: accepted_issuers.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalized authority host this entry was resolved for.
    #[must_use]
    pub fn host_key(&self) -> &str {
        &self.host_key
    }

    /// Issuer authorities (host plus optional port) considered valid aliases
    /// of this authority.
    #[must_use]
    pub fn accepted_issuers(&self) -> &HashSet<String> {
        &self.accepted_issuers
    }
}

/// Lazily resolves and caches accepted issuers per authority host.
///
/// # Concurrency
///
/// Lookups go through a [`moka::future::Cache`]. Concurrent misses for the
/// same host are coalesced: exactly one caller runs the metadata fetch and
/// the others wait for its result, success or failure. Misses for different
/// hosts proceed independently.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokencache_authn::{AuthorityResolver, AuthorityResolverConfig, HttpMetadataFetcher};
///
/// # async fn example() -> Result<(), tokencache_authn::AuthError> {
/// let fetcher = Arc::new(HttpMetadataFetcher::new(reqwest::Client::new()));
/// let resolver = AuthorityResolver::new(fetcher, AuthorityResolverConfig::default())?;
///
/// let entry = resolver.resolve("https://login.example.com/tenant-abc/").await?;
/// assert!(entry.accepted_issuers().contains("login.example.com"));
/// # Ok(())
/// # }
/// ```
pub struct AuthorityResolver {
    entries: Cache<String, Arc<AuthorityEntry>>,
    fetcher: Arc<dyn MetadataFetcher>,
    default_host_key: String,
    fallback_to_default: bool,
}

impl AuthorityResolver {
    /// Creates a resolver that fetches metadata through `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `config` fails validation.
    pub fn new(fetcher: Arc<dyn MetadataFetcher>, config: AuthorityResolverConfig) -> Result<Self> {
        config.validate()?;
        let default_host_key = parse_host_key(config.default_authority()).ok_or_else(|| {
            AuthError::configuration(format!(
                "default_authority {:?} has no host",
                config.default_authority()
            ))
        })?;

        let mut builder = Cache::builder();
        if let Some(capacity) = config.max_capacity() {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = config.time_to_live() {
            builder = builder.time_to_live(ttl);
        }

        Ok(Self {
            entries: builder.build(),
            fetcher,
            default_host_key,
            fallback_to_default: config.fallback_to_default(),
        })
    }

    /// Returns the accepted issuers for `authority`.
    ///
    /// Cached hosts are answered without network access. An uncached host
    /// triggers one metadata fetch shared by all concurrent callers for that
    /// host.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidArgument`] if `authority` is empty, or is unparseable while the
    ///   default-authority fallback is disabled
    /// - [`AuthError::MetadataUnavailable`] if the document could not be fetched, decoded, or
    ///   carried an unusable issuer
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, authority: &str) -> Result<Arc<AuthorityEntry>> {
        let host_key = self.host_key(authority)?;

        if let Some(entry) = self.entries.get(&host_key).await {
            tracing::debug!(host = %host_key, "authority cache hit");
            return Ok(entry);
        }
        tracing::debug!(host = %host_key, "authority cache miss");

        let url = metadata_url(&host_key);
        self.entries
            .try_get_with(host_key.clone(), self.fetch_entry(&host_key, &url))
            .await
            .map_err(|source| {
                tracing::warn!(host = %host_key, error = %source, "metadata unavailable");
                AuthError::metadata_unavailable(url.clone(), source)
            })
    }

    /// Like [`resolve`](Self::resolve), for callers whose authority may be
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] for `None`, otherwise as
    /// [`resolve`](Self::resolve).
    pub async fn resolve_optional(&self, authority: Option<&str>) -> Result<Arc<AuthorityEntry>> {
        match authority {
            Some(authority) => self.resolve(authority).await,
            None => Err(AuthError::invalid_argument("authority is required")),
        }
    }

    /// Normalizes `authority` to its cache key, applying the default
    /// authority fallback.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] if `authority` is empty, or is
    /// unparseable while the fallback is disabled.
    pub fn host_key(&self, authority: &str) -> Result<String> {
        if authority.trim().is_empty() {
            return Err(AuthError::invalid_argument("authority must not be empty"));
        }

        match parse_host_key(authority) {
            Some(host_key) => Ok(host_key),
            None if self.fallback_to_default => {
                tracing::warn!(
                    authority,
                    fallback = %self.default_host_key,
                    "unparseable authority, using default authority host"
                );
                Ok(self.default_host_key.clone())
            },
            None => Err(AuthError::invalid_argument(format!(
                "authority {authority:?} is not an absolute URL with a host"
            ))),
        }
    }

    /// Removes the cached entry for `authority`'s host, if any. The next
    /// resolution for that host fetches metadata again.
    ///
    /// # Errors
    ///
    /// As [`host_key`](Self::host_key).
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, authority: &str) -> Result<()> {
        let host_key = self.host_key(authority)?;
        self.entries.invalidate(&host_key).await;
        tracing::info!(host = %host_key, "authority entry invalidated");
        Ok(())
    }

    /// Number of cached authorities.
    ///
    /// Approximate until [`sync`](Self::sync) has run pending maintenance.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Runs pending cache maintenance so counts and evictions are current.
    pub async fn sync(&self) {
        self.entries.run_pending_tasks().await;
    }

    async fn fetch_entry(
        &self,
        host_key: &str,
        url: &str,
    ) -> std::result::Result<Arc<AuthorityEntry>, MetadataError> {
        let document = self.fetcher.fetch(url).await?;
        let issuer_host = parse_host_key(&document.issuer).ok_or_else(|| {
            MetadataError::invalid_issuer(&document.issuer, "not an absolute URL with a host")
        })?;

        tracing::debug!(host = host_key, issuer = %issuer_host, "resolved accepted issuer");
        Ok(Arc::new(AuthorityEntry::new(host_key, [issuer_host])))
    }
}

impl std::fmt::Debug for AuthorityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityResolver")
            .field("entries", &self.entries.entry_count())
            .field("default_host_key", &self.default_host_key)
            .field("fallback_to_default", &self.fallback_to_default)
            .finish_non_exhaustive()
    }
}

/// Metadata document location for a normalized authority host.
#[must_use]
pub fn metadata_url(host_key: &str) -> String {
    format!("https://{host_key}/common/.well-known/openid-configuration")
}

/// Extracts the URL authority (host plus explicit non-default port) from an
/// absolute URL. Hosts come back in the URL parser's canonical form, so
/// `LOGIN.Example.COM` and `login.example.com` share a key.
fn parse_host_key(value: &str) -> Option<String> {
    let url = Url::parse(value.trim()).ok()?;
    let host = url.host_str().filter(|host| !host.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::testutil::StaticMetadataFetcher;

    fn timeout_error() -> MetadataError {
        MetadataError::Timeout
    }

    fn resolver_with(fetcher: &Arc<StaticMetadataFetcher>) -> AuthorityResolver {
        AuthorityResolver::new(
            Arc::clone(fetcher) as Arc<dyn MetadataFetcher>,
            AuthorityResolverConfig::builder()
                .default_authority("https://login.example.com/common/")
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    #[rstest]
    #[case::tenant_path("https://login.example.com/tenant-id/", "login.example.com")]
    #[case::no_path("https://login.example.com", "login.example.com")]
    #[case::uppercase_host("https://LOGIN.Example.COM/tenant/", "login.example.com")]
    #[case::explicit_port("https://login.example.com:8443/tenant/", "login.example.com:8443")]
    #[case::default_port_dropped("https://login.example.com:443/tenant/", "login.example.com")]
    #[case::ipv6("https://[::1]:9000/tenant/", "[::1]:9000")]
    #[case::query_ignored("https://login.example.com/t/?p=1#frag", "login.example.com")]
    #[case::surrounding_whitespace("  https://login.example.com/t/  ", "login.example.com")]
    fn test_parse_host_key(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse_host_key(input).as_deref(), Some(expected));
    }

    #[rstest]
    #[case::not_a_url("not a url")]
    #[case::relative("login.example.com/tenant")]
    #[case::no_host("urn:example:authority")]
    fn test_parse_host_key_rejects(#[case] input: &str) {
        assert_eq!(parse_host_key(input), None);
    }

    #[test]
    fn test_metadata_url() {
        assert_eq!(
            metadata_url("login.example.com"),
            "https://login.example.com/common/.well-known/openid-configuration"
        );
        assert_eq!(
            metadata_url("login.example.com:8443"),
            "https://login.example.com:8443/common/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn test_resolve_issuer_authority() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", "https://login.example.com/tenant-abc/v2.0");
        let resolver = resolver_with(&fetcher);

        let entry = resolver.resolve("https://login.example.com/tenant-abc/").await.unwrap();

        assert_eq!(entry.host_key(), "login.example.com");
        assert_eq!(entry.accepted_issuers(), &HashSet::from(["login.example.com".to_owned()]));
        assert_eq!(
            fetcher.requested_urls(),
            vec!["https://login.example.com/common/.well-known/openid-configuration".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_issuer_on_different_host() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.alias.example", "https://sts.example.net:8443/tenant/");
        let resolver = resolver_with(&fetcher);

        let entry = resolver.resolve("https://login.alias.example/tenant/").await.unwrap();

        assert!(entry.accepted_issuers().contains("sts.example.net:8443"));
        assert_eq!(entry.accepted_issuers().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_performs_no_fetch() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", "https://login.example.com/t/v2.0");
        let resolver = resolver_with(&fetcher);

        let first = resolver.resolve("https://login.example.com/tenant-a/").await.unwrap();
        assert_eq!(fetcher.fetch_count(), 1);

        // Same host, different tenant path and case: still a hit.
        let second = resolver.resolve("https://LOGIN.example.com/tenant-b/").await.unwrap();

        assert_eq!(fetcher.fetch_count(), 1, "cached host must not trigger a fetch");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace("   ")]
    #[tokio::test]
    async fn test_empty_authority_rejected(#[case] authority: &str) {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        let resolver = resolver_with(&fetcher);

        let result = resolver.resolve(authority).await;

        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_authority_rejected() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        let resolver = resolver_with(&fetcher);

        let result = resolver.resolve_optional(None).await;

        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_authority_uses_default_host() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", "https://login.example.com/common/v2.0");
        let resolver = resolver_with(&fetcher);

        let entry = resolver.resolve("not a url").await.unwrap();

        assert_eq!(entry.host_key(), "login.example.com");
        assert!(entry.accepted_issuers().contains("login.example.com"));
    }

    #[tokio::test]
    async fn test_unparseable_authority_without_fallback() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        let resolver = AuthorityResolver::new(
            Arc::clone(&fetcher) as Arc<dyn MetadataFetcher>,
            AuthorityResolverConfig::builder().fallback_to_default(false).build().unwrap(),
        )
        .unwrap();

        let result = resolver.resolve("not a url").await;

        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_not_cached() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", "https://login.example.com/t/v2.0");
        fetcher.set_failure(Some(timeout_error));
        let resolver = resolver_with(&fetcher);

        let result = resolver.resolve("https://login.example.com/t/").await;
        match result {
            Err(AuthError::MetadataUnavailable { url, source }) => {
                assert_eq!(url, "https://login.example.com/common/.well-known/openid-configuration");
                assert!(matches!(*source, MetadataError::Timeout));
            },
            other => panic!("expected MetadataUnavailable, got {other:?}"),
        }
        resolver.sync().await;
        assert_eq!(resolver.entry_count(), 0, "failures must not be cached");

        fetcher.set_failure(None);
        let entry = resolver.resolve("https://login.example.com/t/").await.unwrap();

        assert!(entry.accepted_issuers().contains("login.example.com"));
        assert_eq!(fetcher.fetch_count(), 2, "retry must fetch again");
    }

    #[rstest]
    #[case::relative_issuer("login.example.com/tenant")]
    #[case::empty_issuer("")]
    #[case::urn_issuer("urn:example:issuer")]
    #[tokio::test]
    async fn test_unusable_issuer(#[case] issuer: &str) {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", issuer);
        let resolver = resolver_with(&fetcher);

        let result = resolver.resolve("https://login.example.com/t/").await;

        match result {
            Err(AuthError::MetadataUnavailable { source, .. }) => {
                assert!(matches!(*source, MetadataError::InvalidIssuer { .. }));
            },
            other => panic!("expected MetadataUnavailable, got {other:?}"),
        }
        resolver.sync().await;
        assert_eq!(resolver.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_host_fails_closed() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        let resolver = resolver_with(&fetcher);

        let result = resolver.resolve("https://unknown.example.org/t/").await;

        assert!(matches!(result, Err(AuthError::MetadataUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_hosts_resolved_independently() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("a.example.com", "https://a.example.com/v2.0");
        fetcher.insert_issuer("b.example.com", "https://b.example.com/v2.0");
        let resolver = resolver_with(&fetcher);

        let a = resolver.resolve("https://a.example.com/t/").await.unwrap();
        let b = resolver.resolve("https://b.example.com/t/").await.unwrap();

        assert!(a.accepted_issuers().contains("a.example.com"));
        assert!(b.accepted_issuers().contains("b.example.com"));
        resolver.sync().await;
        assert_eq!(resolver.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", "https://login.example.com/v2.0");
        let resolver = resolver_with(&fetcher);

        resolver.resolve("https://login.example.com/t/").await.unwrap();
        resolver.invalidate("https://login.example.com/other/").await.unwrap();
        resolver.resolve("https://login.example.com/t/").await.unwrap();

        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_time_to_live_expires_entries() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        fetcher.insert_issuer("login.example.com", "https://login.example.com/v2.0");
        let resolver = AuthorityResolver::new(
            Arc::clone(&fetcher) as Arc<dyn MetadataFetcher>,
            AuthorityResolverConfig::builder()
                .time_to_live(Duration::from_millis(50))
                .build()
                .unwrap(),
        )
        .unwrap();

        resolver.resolve("https://login.example.com/t/").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        resolver.resolve("https://login.example.com/t/").await.unwrap();

        assert_eq!(fetcher.fetch_count(), 2, "expired entry must be fetched again");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let fetcher = Arc::new(StaticMetadataFetcher::new());
        let mut config = AuthorityResolverConfig::default();
        config.default_authority = "no-scheme".to_owned();

        let result = AuthorityResolver::new(fetcher, config);

        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }
}
