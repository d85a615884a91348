//! Pipeline telemetry.
//!
//! Every provider attempt becomes a [`PipelineEvent`]. Events go through a
//! [`TelemetryEmitter`], which hands them to a [`PipelineEventSink`] and
//! never reports a failure back to the caller.

mod emitter;
mod event;
mod sink;
mod stats;

pub use emitter::{EmitterMetrics, TelemetryEmitter};
pub use event::{EventStatus, Metadata, PipelineEvent};
pub use sink::{
    CollectingEventSink, FanoutEventSink, LoggingEventSink, NoOpEventSink, PipelineEventSink,
};
pub use stats::{PipelineStats, PipelineStatsSink};
