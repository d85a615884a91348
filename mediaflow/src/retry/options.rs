//! Per-call retry options.

use crate::provider::Provider;
use crate::telemetry::Metadata;
use std::time::Duration;

/// Retries after the first attempt when the caller sets nothing.
pub const DEFAULT_RETRIES: u32 = 2;
/// Base backoff delay when the caller sets nothing.
pub const DEFAULT_BASE_DELAY_MS: u64 = 400;
/// Smallest base delay honoured.
pub const MIN_BASE_DELAY_MS: u64 = 100;

/// Linear backoff: the wait after attempt `n` is `base × n`.
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

/// Describes one wrapped provider call.
///
/// Built per call and discarded when the call settles.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Logical operation name (e.g. "avatar.generate").
    pub pipeline: String,
    /// Provider being called.
    pub provider: Provider,
    /// Initiating user, for attribution.
    pub user_id: Option<String>,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Base backoff delay in milliseconds, clamped to at least 100.
    pub base_delay_ms: u64,
    /// Caller metadata merged into every event.
    pub metadata: Metadata,
    /// Upper bound on the whole sequence, honoured by
    /// [`run_with_cancellation`].
    ///
    /// [`run_with_cancellation`]: super::RetryOrchestrator::run_with_cancellation
    pub deadline: Option<Duration>,
}

impl RetryOptions {
    /// Creates options with default retry settings.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, provider: Provider) -> Self {
        Self {
            pipeline: pipeline.into(),
            provider,
            user_id: None,
            retries: DEFAULT_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            metadata: Metadata::new(),
            deadline: None,
        }
    }

    /// Sets the user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: Option<impl Into<String>>) -> Self {
        self.user_id = user_id.map(Into::into);
        self
    }

    /// Sets the number of retries.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.base_delay_ms = delay_ms;
        self
    }

    /// Merges caller metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Bounds the whole retry sequence.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Total attempts allowed.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// The clamped base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms.max(MIN_BASE_DELAY_MS))
    }
}
