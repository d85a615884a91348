//! In-memory per-pipeline counters for dashboards and alerting.

use super::{EventStatus, PipelineEvent, PipelineEventSink};
use crate::errors::SinkError;
use crate::failure::FailureKind;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;

/// Aggregated counters for one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Success events.
    pub successes: u64,
    /// Error events (one per failed attempt).
    pub errors: u64,
    /// Successes that needed more than one attempt.
    pub recovered: u64,
    /// Successes served in mock mode.
    pub mock_successes: u64,
    /// Error events by failure kind.
    pub failures_by_kind: HashMap<FailureKind, u64>,
    /// Sum of reported attempt durations.
    pub total_duration_ms: u64,
}

impl PipelineStats {
    /// Returns the total number of attempts seen.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.successes + self.errors
    }

    /// Returns the error rate as a percentage of attempts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self) -> f64 {
        let total = self.attempts();
        if total == 0 {
            0.0
        } else {
            (self.errors as f64 / total as f64) * 100.0
        }
    }

    fn apply(&mut self, event: &PipelineEvent) {
        let flag = |key: &str| {
            event
                .meta(key)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        };

        match event.status {
            EventStatus::Success => {
                self.successes += 1;
                if flag("recovered") {
                    self.recovered += 1;
                }
                if flag("mock") {
                    self.mock_successes += 1;
                }
            }
            EventStatus::Error => {
                self.errors += 1;
                let kind = event
                    .meta("failureType")
                    .and_then(|v| serde_json::from_value::<FailureKind>(v.clone()).ok())
                    .unwrap_or_default();
                *self.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
        }

        self.total_duration_ms += event.duration_ms.unwrap_or(0);
    }
}

/// A sink that keeps running counters per pipeline.
#[derive(Debug, Default)]
pub struct PipelineStatsSink {
    stats: DashMap<String, PipelineStats>,
}

impl PipelineStatsSink {
    /// Creates an empty stats sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of one pipeline's counters.
    #[must_use]
    pub fn snapshot(&self, pipeline: &str) -> Option<PipelineStats> {
        self.stats.get(pipeline).map(|entry| entry.value().clone())
    }

    /// Returns the names of all pipelines seen so far, sorted.
    #[must_use]
    pub fn pipelines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stats.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Clears all counters.
    pub fn reset(&self) {
        self.stats.clear();
    }

    /// Converts all counters to a dictionary keyed by pipeline.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .stats
            .iter()
            .map(|entry| {
                let stats = entry.value();
                (
                    entry.key().clone(),
                    serde_json::json!({
                        "successes": stats.successes,
                        "errors": stats.errors,
                        "recovered": stats.recovered,
                        "mock_successes": stats.mock_successes,
                        "failures_by_kind": stats.failures_by_kind,
                        "error_rate_percent": (stats.error_rate() * 100.0).round() / 100.0,
                    }),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[async_trait]
impl PipelineEventSink for PipelineStatsSink {
    async fn record(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        self.stats
            .entry(event.pipeline.clone())
            .or_default()
            .apply(event);
        Ok(())
    }
}
