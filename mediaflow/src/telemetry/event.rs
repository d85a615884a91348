//! Pipeline event emitted once per provider attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open metadata mapping merged into every event.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Outcome recorded by a pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The attempt produced a result.
    Success,
    /// The attempt failed.
    Error,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A structured telemetry record for one attempt of a pipeline.
///
/// `error` is only ever set on events built with [`PipelineEvent::failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Logical operation name (e.g. "avatar.generate").
    pub pipeline: String,
    /// Attempt outcome.
    pub status: EventStatus,
    /// Attempt duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Initiating user, for attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Event metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Failure message for error events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the event was built.
    pub recorded_at: DateTime<Utc>,
}

impl PipelineEvent {
    /// Creates a success event.
    #[must_use]
    pub fn success(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            status: EventStatus::Success,
            duration_ms: None,
            user_id: None,
            metadata: Metadata::new(),
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// Creates an error event carrying the failure message.
    #[must_use]
    pub fn failure(pipeline: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Error,
            error: Some(error.into()),
            ..Self::success(pipeline)
        }
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Merges metadata; later keys overwrite earlier ones.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true for success events.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == EventStatus::Success
    }

    /// Looks up a metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}
