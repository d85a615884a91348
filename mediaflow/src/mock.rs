//! Deterministic stand-ins for provider calls.
//!
//! When mock mode is on, adapters skip the network entirely, return one of
//! these artifacts and record a single success event.

use crate::retry::RetryOptions;
use crate::telemetry::{PipelineEvent, TelemetryEmitter};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use uuid::Uuid;

/// Environment variable that switches mock mode on.
pub const MOCK_MODE_ENV: &str = "MEDIAFLOW_MOCK_PROVIDERS";

/// A 1×1 transparent PNG.
const TRANSPARENT_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Returns true for `1`, `true`, `yes` or `on`, ignoring case and
/// surrounding whitespace.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Reads the mock mode flag from the process environment.
#[must_use]
pub fn is_mock_mode_enabled() -> bool {
    std::env::var(MOCK_MODE_ENV).is_ok_and(|value| parse_flag(&value))
}

/// Encodes text as a base64 data URL.
#[must_use]
pub fn make_mock_data_url(mime_type: &str, content: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(content.as_bytes()))
}

/// Returns a data URL holding a 1×1 transparent PNG.
#[must_use]
pub fn make_mock_png_data_url() -> String {
    format!("data:image/png;base64,{TRANSPARENT_PNG_BASE64}")
}

/// Returns an opaque identifier of the form `mock-<prefix>-<uuid>`.
#[must_use]
pub fn make_mock_id(prefix: &str) -> String {
    format!("mock-{prefix}-{}", Uuid::new_v4())
}

/// Records the single success event for a mocked call.
///
/// `mock`, `attempt`, `retries` and `recovered` are fixed and override any
/// caller metadata with the same key.
pub async fn record_mock_provider_success(emitter: &TelemetryEmitter, options: &RetryOptions) {
    let event = PipelineEvent::success(&options.pipeline)
        .with_user_id(options.user_id.clone())
        .with_metadata(options.metadata.clone())
        .with_entry("provider", serde_json::json!(options.provider))
        .with_entry("mock", serde_json::json!(true))
        .with_entry("attempt", serde_json::json!(1))
        .with_entry("retries", serde_json::json!(0))
        .with_entry("recovered", serde_json::json!(false));

    emitter.record_pipeline_event(event).await;
}

/// Decides, per call, whether mock mode is on.
pub trait MockModeSource: Send + Sync {
    /// Returns true when provider calls should be mocked.
    fn is_enabled(&self) -> bool;
}

/// A fixed mock mode decided at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticMockMode(pub bool);

impl StaticMockMode {
    /// Captures the current environment flag.
    #[must_use]
    pub fn from_env() -> Self {
        Self(is_mock_mode_enabled())
    }
}

impl MockModeSource for StaticMockMode {
    fn is_enabled(&self) -> bool {
        self.0
    }
}

/// Re-reads an environment variable on every call, so mock mode can be
/// toggled without a restart.
#[derive(Debug, Clone)]
pub struct EnvMockMode {
    var: String,
}

impl EnvMockMode {
    /// Watches [`MOCK_MODE_ENV`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_var(MOCK_MODE_ENV)
    }

    /// Watches a custom variable.
    #[must_use]
    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvMockMode {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModeSource for EnvMockMode {
    fn is_enabled(&self) -> bool {
        std::env::var(&self.var).is_ok_and(|value| parse_flag(&value))
    }
}

/// Placeholder payloads returned by adapters in mock mode.
#[derive(Clone, PartialEq)]
pub struct MockArtifacts {
    /// Avatar image URL.
    pub image_url: String,
    /// Lip-sync video URL.
    pub video_url: String,
    /// Transcript text.
    pub transcript: String,
    /// Transcript duration in seconds.
    pub transcript_duration: f64,
    /// Transcript language.
    pub transcript_language: String,
}

impl Default for MockArtifacts {
    fn default() -> Self {
        Self {
            image_url: make_mock_png_data_url(),
            video_url: make_mock_data_url("video/mp4", "mock lipsync video"),
            transcript: "This is a mock transcript.".to_string(),
            transcript_duration: 1.0,
            transcript_language: "en".to_string(),
        }
    }
}

impl fmt::Debug for MockArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockArtifacts")
            .field("image_url_len", &self.image_url.len())
            .field("video_url_len", &self.video_url.len())
            .field("transcript", &self.transcript)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::telemetry::CollectingEventSink;
    use crate::testing::assert_mock_success;
    use std::sync::Arc;

    fn decode_data_url(url: &str) -> (String, Vec<u8>) {
        let rest = url.strip_prefix("data:").unwrap();
        let (mime, payload) = rest.split_once(";base64,").unwrap();
        (mime.to_string(), STANDARD.decode(payload).unwrap())
    }

    #[test]
    fn test_parse_flag_truthy_values() {
        for value in ["1", "true", "TRUE", "On", "yes", " YES "] {
            assert!(parse_flag(value), "{value:?} should enable mock mode");
        }
    }

    #[test]
    fn test_parse_flag_falsy_values() {
        for value in ["", "0", "false", "off", "no", "enabled", "2"] {
            assert!(!parse_flag(value), "{value:?} should not enable mock mode");
        }
    }

    #[test]
    fn test_is_mock_mode_enabled_reads_environment() {
        std::env::remove_var(MOCK_MODE_ENV);
        assert!(!is_mock_mode_enabled());

        for value in ["1", "TRUE", "On"] {
            std::env::set_var(MOCK_MODE_ENV, value);
            assert!(is_mock_mode_enabled(), "{value:?} should enable mock mode");
        }
        for value in ["0", "false"] {
            std::env::set_var(MOCK_MODE_ENV, value);
            assert!(!is_mock_mode_enabled(), "{value:?} should not enable mock mode");
        }

        std::env::remove_var(MOCK_MODE_ENV);
        assert!(!is_mock_mode_enabled());
    }

    #[test]
    fn test_env_mock_mode_rereads_variable() {
        let var = "MEDIAFLOW_TEST_MOCK_TOGGLE";
        let source = EnvMockMode::with_var(var);

        std::env::remove_var(var);
        assert!(!source.is_enabled());

        std::env::set_var(var, "On");
        assert!(source.is_enabled());

        std::env::set_var(var, "0");
        assert!(!source.is_enabled());

        std::env::remove_var(var);
    }

    #[test]
    fn test_static_mock_mode() {
        assert!(StaticMockMode(true).is_enabled());
        assert!(!StaticMockMode::default().is_enabled());
    }

    #[test]
    fn test_data_url_round_trips() {
        let url = make_mock_data_url("text/plain", "hello");
        assert!(url.starts_with("data:text/plain;base64,"));

        let (mime, bytes) = decode_data_url(&url);
        assert_eq!(mime, "text/plain");
        assert_eq!(String::from_utf8(bytes).unwrap(), "hello");
    }

    #[test]
    fn test_png_data_url_is_a_png() {
        let url = make_mock_png_data_url();
        assert_eq!(url, make_mock_png_data_url());

        let (mime, bytes) = decode_data_url(&url);
        assert_eq!(mime, "image/png");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        // IHDR width and height.
        assert_eq!(&bytes[16..24], &[0, 0, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_mock_id_shape() {
        let id = make_mock_id("avatar");
        let uuid = id.strip_prefix("mock-avatar-").unwrap();
        assert!(Uuid::parse_str(uuid).is_ok());
    }

    #[tokio::test]
    async fn test_record_mock_success_forces_fixed_keys() {
        let sink = Arc::new(CollectingEventSink::new());
        let emitter = TelemetryEmitter::inline(sink.clone());
        let options = RetryOptions::new("avatar.generate", Provider::Fal)
            .with_user_id(Some("user-1"))
            .with_entry("mock", serde_json::json!(false))
            .with_entry("style", serde_json::json!("anime"));

        record_mock_provider_success(&emitter, &options).await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_mock_success(&events[0]);
        assert_eq!(events[0].user_id.as_deref(), Some("user-1"));
        assert_eq!(events[0].meta("style"), Some(&serde_json::json!("anime")));
        assert_eq!(events[0].meta("provider"), Some(&serde_json::json!("fal")));
    }

    #[test]
    fn test_default_artifacts() {
        let artifacts = MockArtifacts::default();
        assert!(artifacts.image_url.starts_with("data:image/png;base64,"));
        assert!(artifacts.video_url.starts_with("data:video/mp4;base64,"));
        assert!(!artifacts.transcript.is_empty());
    }
}
