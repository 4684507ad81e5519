//! Timeout and retry configuration for backend calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds applied to every live backend call.
///
/// Retries happen only for transient failures, and status writes are only
/// retried when the backend deduplicates by mutation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles per retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single retry delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that makes exactly one attempt per call.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Parses a policy from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the document is malformed.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    /// Returns the per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the delay before retry number `retry` (1-based).
    ///
    /// A backend-suggested delay wins when it is longer; the result never
    /// exceeds `max_backoff_ms`.
    #[must_use]
    pub fn backoff_for(&self, retry: u32, suggested: Option<Duration>) -> Duration {
        let factor = 1_u64
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let exponential = Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor));
        let cap = Duration::from_millis(self.max_backoff_ms);
        suggested.map_or(exponential, |hint| hint.max(exponential)).min(cap)
    }
}
