//! Test fixtures for orchestrated provider calls.

use std::sync::Arc;

use crate::retry::RetryOrchestrator;
use crate::telemetry::{CollectingEventSink, PipelineEvent, TelemetryEmitter};

/// An orchestrator whose events land in a collecting sink.
#[derive(Debug)]
pub struct TestHarness {
    /// Captures every recorded event.
    pub sink: Arc<CollectingEventSink>,
    /// The orchestrator under test.
    pub orchestrator: RetryOrchestrator,
}

impl TestHarness {
    /// Creates a harness with an inline emitter.
    #[must_use]
    pub fn new() -> Self {
        let sink = Arc::new(CollectingEventSink::new());
        let emitter = Arc::new(TelemetryEmitter::inline(sink.clone()));

        Self {
            sink,
            orchestrator: RetryOrchestrator::new(emitter),
        }
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.sink.events()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
