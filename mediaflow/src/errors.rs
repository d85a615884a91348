//! Error types for the mediaflow provider layer.
//!
//! Provider clients fail with [`ProviderError`]; adapters surface
//! [`AdapterError`] to their callers. Telemetry sinks report [`SinkError`],
//! which never travels past the emitter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum MediaflowError {
    /// Configuration could not be read.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A provider adapter failed.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// The tracing subscriber could not be installed.
    #[error("Tracing setup failed: {0}")]
    Tracing(String),
}

/// An error returned by a provider client.
///
/// Displays as its message verbatim so the failure classifier and telemetry
/// see exactly what the provider said.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    /// The provider's error message.
    pub message: String,
    /// HTTP status code, when the provider returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Provider or transport error code (e.g. "ECONNRESET").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ProviderError {
    /// Creates a provider error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    /// Sets the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        if let Some(status) = self.status {
            map.insert("status".to_string(), serde_json::json!(status));
        }
        if let Some(ref code) = self.code {
            map.insert("code".to_string(), serde_json::json!(code));
        }
        map
    }
}

/// Errors raised by provider adapters to their callers.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider call failed on every attempt. The last failure is kept
    /// unmodified.
    #[error("{source}")]
    Provider {
        /// Human-readable operation name (e.g. "Avatar generation").
        operation: &'static str,
        /// The final provider failure.
        source: ProviderError,
    },

    /// The provider answered but the expected payload was absent.
    #[error("{what}")]
    MissingPayload {
        /// Human-readable operation name.
        operation: &'static str,
        /// What was missing (e.g. "No image generated").
        what: String,
    },

    /// The caller cancelled the call or its deadline elapsed.
    #[error("{operation} cancelled: {reason}")]
    Cancelled {
        /// Human-readable operation name.
        operation: &'static str,
        /// The cancellation reason.
        reason: String,
    },
}

impl AdapterError {
    /// Creates a provider failure error.
    #[must_use]
    pub fn provider(operation: &'static str, source: ProviderError) -> Self {
        Self::Provider { operation, source }
    }

    /// Creates a missing payload error.
    #[must_use]
    pub fn missing_payload(operation: &'static str, what: impl Into<String>) -> Self {
        Self::MissingPayload {
            operation,
            what: what.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Cancelled {
            operation,
            reason: reason.into(),
        }
    }

    /// Returns the underlying provider failure, if any.
    #[must_use]
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true for validation failures (payload missing after a
    /// successful round-trip).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingPayload { .. })
    }

    /// Message suitable for the route layer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider { operation, source } => format!("{operation} failed: {source}"),
            Self::MissingPayload { what, .. } => what.clone(),
            Self::Cancelled { operation, .. } => format!("{operation} was cancelled"),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::Provider { operation, source } => {
                map.insert("type".to_string(), serde_json::json!("ProviderFailure"));
                map.insert("operation".to_string(), serde_json::json!(operation));
                map.insert("provider_error".to_string(), serde_json::json!(source.to_dict()));
            }
            Self::MissingPayload { operation, what } => {
                map.insert("type".to_string(), serde_json::json!("MissingPayload"));
                map.insert("operation".to_string(), serde_json::json!(operation));
                map.insert("what".to_string(), serde_json::json!(what));
            }
            Self::Cancelled { operation, reason } => {
                map.insert("type".to_string(), serde_json::json!("Cancelled"));
                map.insert("operation".to_string(), serde_json::json!(operation));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised when a configuration value cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    /// The environment key.
    pub key: String,
    /// The raw value.
    pub value: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new config error.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised by a telemetry sink while persisting an event.
#[derive(Debug, Clone, Error)]
#[error("Sink error: {message}")]
pub struct SinkError {
    /// Description of the failure.
    pub message: String,
}

impl SinkError {
    /// Creates a new sink error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_displays_message_verbatim() {
        let err = ProviderError::new("HTTP 429 Too Many Requests").with_status(429);
        assert_eq!(err.to_string(), "HTTP 429 Too Many Requests");
        assert_eq!(err.status, Some(429));
    }

    #[test]
    fn test_provider_error_to_dict() {
        let err = ProviderError::new("boom").with_code("ECONNRESET");
        let dict = err.to_dict();

        assert_eq!(dict.get("message").unwrap(), "boom");
        assert_eq!(dict.get("code").unwrap(), "ECONNRESET");
        assert!(!dict.contains_key("status"));
    }

    #[test]
    fn test_adapter_error_user_messages() {
        let err =
            AdapterError::provider("Avatar generation", ProviderError::new("invalid api key"));
        assert_eq!(err.to_string(), "invalid api key");
        assert_eq!(err.user_message(), "Avatar generation failed: invalid api key");

        let err = AdapterError::missing_payload("Avatar generation", "No image generated");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "No image generated");

        let err = AdapterError::cancelled("Lipsync", "client disconnected");
        assert_eq!(err.user_message(), "Lipsync was cancelled");
    }

    #[test]
    fn test_adapter_error_to_dict() {
        let err = AdapterError::missing_payload("Transcription", "No transcript returned");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "MissingPayload");
        assert_eq!(dict.get("message").unwrap(), "No transcript returned");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::new("MEDIAFLOW_PROVIDER_RETRIES", "lots", "expected an integer");
        assert!(err.to_string().contains("MEDIAFLOW_PROVIDER_RETRIES"));
        assert!(err.to_string().contains("\"lots\""));
    }
}
