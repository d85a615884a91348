//! Configuration for the provider layer.
//!
//! Values come from serde (files, tests) or from `MEDIAFLOW_*` environment
//! variables via [`MediaflowConfig::from_env`].

use crate::errors::ConfigError;
use crate::mock::{parse_flag, MockModeSource, StaticMockMode, MOCK_MODE_ENV};
use crate::observability::LogFormat;
use crate::retry::{RetryOptions, DEFAULT_BASE_DELAY_MS, DEFAULT_RETRIES};
use crate::telemetry::{PipelineEventSink, TelemetryEmitter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Environment variable for the default retry count.
pub const RETRIES_ENV: &str = "MEDIAFLOW_PROVIDER_RETRIES";
/// Environment variable for the default base delay.
pub const BASE_DELAY_ENV: &str = "MEDIAFLOW_PROVIDER_BASE_DELAY_MS";
/// Environment variable for the telemetry dispatch mode.
pub const TELEMETRY_MODE_ENV: &str = "MEDIAFLOW_TELEMETRY_MODE";
/// Environment variable for the telemetry queue capacity.
pub const TELEMETRY_QUEUE_ENV: &str = "MEDIAFLOW_TELEMETRY_QUEUE";
/// Environment variable for the log output format.
pub const LOG_FORMAT_ENV: &str = "MEDIAFLOW_LOG_FORMAT";

/// Retry settings applied to every adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDefaults {
    /// Retries after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryDefaults {
    /// Applies these defaults to a set of options.
    #[must_use]
    pub fn apply(&self, options: RetryOptions) -> RetryOptions {
        options
            .with_retries(self.retries)
            .with_base_delay_ms(self.base_delay_ms)
    }
}

/// How the telemetry emitter reaches its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryMode {
    /// Await the sink inside the call.
    Inline,
    /// Enqueue and let a background worker write.
    #[default]
    Queued,
}

/// Telemetry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Dispatch mode.
    #[serde(default)]
    pub mode: TelemetryMode,
    /// Queue capacity for queued mode.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mode: TelemetryMode::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl TelemetryConfig {
    /// Builds an emitter for `sink`.
    ///
    /// Queued mode spawns a worker, so it must run inside a Tokio runtime.
    #[must_use]
    pub fn build_emitter(&self, sink: Arc<dyn PipelineEventSink>) -> TelemetryEmitter {
        match self.mode {
            TelemetryMode::Inline => TelemetryEmitter::inline(sink),
            TelemetryMode::Queued => TelemetryEmitter::queued(sink, self.queue_capacity),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaflowConfig {
    /// Serve deterministic mock results instead of calling providers.
    #[serde(default)]
    pub mock_mode: bool,
    /// Retry defaults.
    #[serde(default)]
    pub retry: RetryDefaults,
    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl MediaflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets mock mode.
    #[must_use]
    pub fn with_mock_mode(mut self, enabled: bool) -> Self {
        self.mock_mode = enabled;
        self
    }

    /// Sets the retry defaults.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryDefaults) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the telemetry settings.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(MOCK_MODE_ENV) {
            config.mock_mode = parse_flag(&value);
        }

        if let Some(value) = lookup(RETRIES_ENV) {
            let retries: i64 = parse_number(RETRIES_ENV, &value)?;
            // Negative counts mean "no retries".
            config.retry.retries = u32::try_from(retries.max(0)).unwrap_or(u32::MAX);
        }

        if let Some(value) = lookup(BASE_DELAY_ENV) {
            config.retry.base_delay_ms = parse_number(BASE_DELAY_ENV, &value)?;
        }

        if let Some(value) = lookup(TELEMETRY_MODE_ENV) {
            config.telemetry.mode = match value.trim().to_ascii_lowercase().as_str() {
                "inline" => TelemetryMode::Inline,
                "queued" => TelemetryMode::Queued,
                _ => {
                    return Err(ConfigError::new(
                        TELEMETRY_MODE_ENV,
                        value,
                        "expected \"inline\" or \"queued\"",
                    ))
                }
            };
        }

        if let Some(value) = lookup(TELEMETRY_QUEUE_ENV) {
            let capacity: usize = parse_number(TELEMETRY_QUEUE_ENV, &value)?;
            if capacity == 0 {
                return Err(ConfigError::new(TELEMETRY_QUEUE_ENV, value, "must be at least 1"));
            }
            config.telemetry.queue_capacity = capacity;
        }

        if let Some(value) = lookup(LOG_FORMAT_ENV) {
            config.log_format = match value.trim().to_ascii_lowercase().as_str() {
                "pretty" | "text" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::new(
                        LOG_FORMAT_ENV,
                        value,
                        "expected \"pretty\" or \"json\"",
                    ))
                }
            };
        }

        Ok(config)
    }

    /// Returns a fixed mock mode source for this configuration.
    #[must_use]
    pub fn mock_mode_source(&self) -> Arc<dyn MockModeSource> {
        Arc::new(StaticMockMode(self.mock_mode))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::new(key, value, "expected an integer"))
}
