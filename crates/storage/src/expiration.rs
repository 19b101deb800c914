//! Per-entry expiration policy applied by a [`BlobStore`](crate::BlobStore).
//!
//! Two independent deadlines may be set:
//!
//! - **Absolute**: the entry expires a fixed duration after it was written.
//! - **Sliding**: the entry expires after a period without reads; each read renews the window,
//!   but never beyond the absolute deadline.
//!
//! With neither set, the entry lives until it is deleted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Expiration parameters attached to a write.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tokencache_storage::ExpirationOptions;
///
/// let options = ExpirationOptions::builder()
///     .absolute_expiration(Duration::from_secs(14 * 24 * 3600))
///     .sliding_expiration(Duration::from_secs(3600))
///     .build();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct ExpirationOptions {
    /// Lifetime measured from the moment of writing.
    #[serde(default, with = "humantime_serde")]
    pub absolute_expiration: Option<Duration>,

    /// Idle window renewed on every read.
    #[serde(default, with = "humantime_serde")]
    pub sliding_expiration: Option<Duration>,
}

impl ExpirationOptions {
    /// Entries written with these options never expire.
    #[must_use]
    pub const fn never() -> Self {
        Self { absolute_expiration: None, sliding_expiration: None }
    }

    /// Expire a fixed duration after writing.
    #[must_use]
    pub const fn absolute(ttl: Duration) -> Self {
        Self { absolute_expiration: Some(ttl), sliding_expiration: None }
    }

    /// Expire after `window` without a read.
    #[must_use]
    pub const fn sliding(window: Duration) -> Self {
        Self { absolute_expiration: None, sliding_expiration: Some(window) }
    }

    /// Returns `true` when neither deadline is set.
    #[must_use]
    pub fn is_never(&self) -> bool {
        self.absolute_expiration.is_none() && self.sliding_expiration.is_none()
    }

    /// Rejects zero durations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidExpiration`] naming the first offending
    /// field.
    pub fn validate(&self) -> StorageResult<()> {
        if let Some(value) = self.absolute_expiration
            && value.is_zero()
        {
            return Err(StorageError::InvalidExpiration { field: "absolute_expiration", value });
        }
        if let Some(value) = self.sliding_expiration
            && value.is_zero()
        {
            return Err(StorageError::InvalidExpiration { field: "sliding_expiration", value });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_default_is_never() {
        assert!(ExpirationOptions::default().is_never());
        assert_eq!(ExpirationOptions::default(), ExpirationOptions::never());
    }

    #[rstest]
    #[case::absolute(ExpirationOptions::absolute(Duration::ZERO), "absolute_expiration")]
    #[case::sliding(ExpirationOptions::sliding(Duration::ZERO), "sliding_expiration")]
    fn test_zero_duration_rejected(#[case] options: ExpirationOptions, #[case] field: &str) {
        let err = options.validate().unwrap_err();
        assert!(
            matches!(err, StorageError::InvalidExpiration { field: f, .. } if f == field),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_deserialize_humantime() {
        let options: ExpirationOptions =
            serde_json::from_str(r#"{"absolute_expiration":"14days","sliding_expiration":"1h"}"#)
                .unwrap();

        assert_eq!(options.absolute_expiration, Some(Duration::from_secs(14 * 24 * 3600)));
        assert_eq!(options.sliding_expiration, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_deserialize_empty_is_never() {
        let options: ExpirationOptions = serde_json::from_str("{}").unwrap();
        assert!(options.is_never());
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result = serde_json::from_str::<ExpirationOptions>(r#"{"ttl":"1h"}"#);
        assert!(result.is_err());
    }
}
