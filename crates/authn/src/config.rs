//! Configuration for the authority resolver, the metadata fetcher and the
//! token cache adapter.
//!
//! All types deserialize with `serde` (durations in `humantime` form such as
//! `"14days"` or `"30m"`) and expose `bon` builders. Builders validate;
//! deserialized values are validated when handed to the component that uses
//! them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokencache_storage::ExpirationOptions;
use url::Url;

use crate::error::{AuthError, Result};

/// Authority whose host is used when a caller supplies an unparseable
/// authority URL.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/";

/// Default cap on metadata response bodies (1 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Default byte budget for the in-process L1 token cache (256 MiB).
pub const DEFAULT_L1_SIZE_LIMIT: u64 = 256 * 1024 * 1024;

/// Default lifetime of an L1 token cache entry (1 hour).
pub const DEFAULT_L1_TTL: Duration = Duration::from_secs(3600);

/// Configuration for [`AuthorityResolver`](crate::AuthorityResolver).
///
/// The authority cache is unbounded and permanent by default: tenant
/// authorities are few and stable. Deployments with unbounded authority
/// cardinality can set `max_capacity` and/or `time_to_live`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tokencache_authn::AuthorityResolverConfig;
///
/// let config = AuthorityResolverConfig::builder()
///     .default_authority("https://login.example.com/common/")
///     .max_capacity(1_000)
///     .time_to_live(Duration::from_secs(24 * 3600))
///     .build()?;
/// # Ok::<(), tokencache_authn::AuthError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityResolverConfig {
    /// Authority whose host replaces an unparseable input.
    #[serde(default = "default_authority")]
    pub(crate) default_authority: String,

    /// Whether unparseable input falls back to `default_authority` at all.
    #[serde(default = "default_fallback")]
    pub(crate) fallback_to_default: bool,

    /// Upper bound on cached authorities.
    #[serde(default)]
    pub(crate) max_capacity: Option<u64>,

    /// Lifetime of a cached authority entry.
    #[serde(default, with = "humantime_serde")]
    pub(crate) time_to_live: Option<Duration>,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_owned()
}

fn default_fallback() -> bool {
    true
}

impl Default for AuthorityResolverConfig {
    fn default() -> Self {
        Self {
            default_authority: default_authority(),
            fallback_to_default: default_fallback(),
            max_capacity: None,
            time_to_live: None,
        }
    }
}

#[bon::bon]
impl AuthorityResolverConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `default_authority` - Fallback authority (default: [`DEFAULT_AUTHORITY`]).
    /// * `fallback_to_default` - Enable the fallback (default: `true`).
    /// * `max_capacity` - Bound on cached authorities (default: unbounded).
    /// * `time_to_live` - Entry lifetime (default: process lifetime).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if:
    /// - `default_authority` is not an absolute URL with a host
    /// - `max_capacity` or `time_to_live` is zero
    #[builder]
    pub fn new(
        #[builder(into, default = default_authority())] default_authority: String,
        #[builder(default = true)] fallback_to_default: bool,
        max_capacity: Option<u64>,
        time_to_live: Option<Duration>,
    ) -> Result<Self> {
        let config = Self {
            default_authority,
            fallback_to_default,
            max_capacity,
            time_to_live,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// See [`AuthorityResolverConfig::builder`].
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.default_authority).map_err(|e| {
            AuthError::configuration(format!(
                "default_authority {:?} is not an absolute URL: {e}",
                self.default_authority
            ))
        })?;
        if parsed.host_str().is_none() {
            return Err(AuthError::configuration(format!(
                "default_authority {:?} has no host",
                self.default_authority
            )));
        }
        if self.max_capacity == Some(0) {
            return Err(AuthError::configuration("max_capacity must be greater than zero"));
        }
        if self.time_to_live.is_some_and(|ttl| ttl.is_zero()) {
            return Err(AuthError::configuration("time_to_live must be greater than zero"));
        }
        Ok(())
    }

    /// Returns the fallback authority.
    #[must_use]
    pub fn default_authority(&self) -> &str {
        &self.default_authority
    }

    /// Returns whether unparseable input falls back to the default authority.
    #[must_use]
    pub fn fallback_to_default(&self) -> bool {
        self.fallback_to_default
    }

    /// Returns the authority cache capacity bound, if any.
    #[must_use]
    pub fn max_capacity(&self) -> Option<u64> {
        self.max_capacity
    }

    /// Returns the authority entry lifetime, if any.
    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }
}

/// Configuration for [`HttpMetadataFetcher`](crate::HttpMetadataFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct HttpFetcherConfig {
    /// Largest accepted response body in bytes.
    #[serde(default = "default_max_response_size")]
    #[builder(default = DEFAULT_MAX_RESPONSE_SIZE)]
    pub max_response_size: usize,
}

fn default_max_response_size() -> usize {
    DEFAULT_MAX_RESPONSE_SIZE
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self { max_response_size: DEFAULT_MAX_RESPONSE_SIZE }
    }
}

/// Options for [`TokenCacheAdapter`](crate::TokenCacheAdapter).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tokencache_authn::TokenCacheOptions;
/// use tokencache_storage::ExpirationOptions;
///
/// let options = TokenCacheOptions::builder()
///     .expiration(ExpirationOptions::sliding(Duration::from_secs(14 * 24 * 3600)))
///     .build();
/// assert!(options.l1_cache.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct TokenCacheOptions {
    /// Expiration applied to every write.
    #[serde(default)]
    #[builder(default)]
    pub expiration: ExpirationOptions,

    /// In-process cache in front of the blob store; disabled when `None`.
    #[serde(default)]
    pub l1_cache: Option<L1CacheOptions>,
}

impl TokenCacheOptions {
    /// Checks invariants that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for zero expiration durations,
    /// a zero L1 size limit, or a zero L1 lifetime.
    pub fn validate(&self) -> Result<()> {
        self.expiration.validate().map_err(|e| AuthError::configuration(e.to_string()))?;
        if let Some(l1) = &self.l1_cache {
            if l1.size_limit == 0 {
                return Err(AuthError::configuration("l1_cache.size_limit must be greater than zero"));
            }
            if l1.time_to_live.is_zero() {
                return Err(AuthError::configuration(
                    "l1_cache.time_to_live must be greater than zero",
                ));
            }
        }
        Ok(())
    }
}

/// Sizing for the optional in-process L1 token cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct L1CacheOptions {
    /// Total payload bytes held before least-recently-used eviction.
    #[serde(default = "default_l1_size_limit")]
    #[builder(default = DEFAULT_L1_SIZE_LIMIT)]
    pub size_limit: u64,

    /// Lifetime of an L1 entry.
    #[serde(default = "default_l1_ttl", with = "humantime_serde")]
    #[builder(default = DEFAULT_L1_TTL)]
    pub time_to_live: Duration,
}

fn default_l1_size_limit() -> u64 {
    DEFAULT_L1_SIZE_LIMIT
}

fn default_l1_ttl() -> Duration {
    DEFAULT_L1_TTL
}

impl Default for L1CacheOptions {
    fn default() -> Self {
        Self { size_limit: DEFAULT_L1_SIZE_LIMIT, time_to_live: DEFAULT_L1_TTL }
    }
}
