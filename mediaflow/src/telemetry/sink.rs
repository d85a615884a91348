//! Pipeline event sink trait and implementations.

use super::PipelineEvent;
use crate::errors::SinkError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, Level};

/// Destination for pipeline events.
///
/// Sinks may fail; the [`TelemetryEmitter`](super::TelemetryEmitter) absorbs
/// those failures so callers never see them. Sinks must tolerate concurrent
/// calls.
#[async_trait]
pub trait PipelineEventSink: Send + Sync {
    /// Persists one event.
    async fn record(&self, event: &PipelineEvent) -> Result<(), SinkError>;
}

/// A no-op sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl PipelineEventSink for NoOpEventSink {
    async fn record(&self, _event: &PipelineEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &PipelineEvent) {
        let metadata = serde_json::Value::Object(event.metadata.clone());
        if self.level == Level::DEBUG {
            debug!(
                pipeline = %event.pipeline,
                status = %event.status,
                duration_ms = ?event.duration_ms,
                user_id = ?event.user_id,
                error = ?event.error,
                metadata = %metadata,
                "Pipeline event: {}", event.pipeline
            );
        } else {
            info!(
                pipeline = %event.pipeline,
                status = %event.status,
                duration_ms = ?event.duration_ms,
                user_id = ?event.user_id,
                error = ?event.error,
                metadata = %metadata,
                "Pipeline event: {}", event.pipeline
            );
        }
    }
}

#[async_trait]
impl PipelineEventSink for LoggingEventSink {
    async fn record(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        self.log_event(event);
        Ok(())
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events for one pipeline.
    #[must_use]
    pub fn events_for(&self, pipeline: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.pipeline == pipeline)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PipelineEventSink for CollectingEventSink {
    async fn record(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

/// Forwards each event to several sinks.
///
/// Every sink is tried even when an earlier one fails; the failures are
/// reported together.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn PipelineEventSink>>,
}

impl FanoutEventSink {
    /// Creates an empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a downstream sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn PipelineEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the number of downstream sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if there are no downstream sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl PipelineEventSink for FanoutEventSink {
    async fn record(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.record(event).await {
                failures.push(err.message);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError::new(failures.join("; ")))
        }
    }
}
