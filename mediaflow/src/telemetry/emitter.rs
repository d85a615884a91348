//! The single entry point for recording pipeline events.

use super::{LoggingEventSink, PipelineEvent, PipelineEventSink};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counters describing what happened to emitted events.
#[derive(Debug, Default)]
pub struct EmitterMetrics {
    /// Events accepted by the sink.
    recorded: AtomicU64,
    /// Events dropped before reaching the sink.
    dropped: AtomicU64,
    /// Events the sink rejected.
    sink_failures: AtomicU64,
}

impl EmitterMetrics {
    fn record_success(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of events the sink accepted.
    #[must_use]
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Returns the number of events dropped because the queue was full or
    /// closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of events the sink failed to persist.
    #[must_use]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Returns the share of events lost, as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn loss_rate(&self) -> f64 {
        let lost = self.dropped() + self.sink_failures();
        let total = lost + self.recorded();
        if total == 0 {
            0.0
        } else {
            (lost as f64 / total as f64) * 100.0
        }
    }

    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "recorded": self.recorded(),
            "dropped": self.dropped(),
            "sink_failures": self.sink_failures(),
            "loss_rate_percent": (self.loss_rate() * 100.0).round() / 100.0
        })
    }
}

/// Hands one event to the sink, absorbing errors and panics.
async fn deliver(sink: &dyn PipelineEventSink, event: &PipelineEvent, metrics: &EmitterMetrics) {
    match AssertUnwindSafe(sink.record(event)).catch_unwind().await {
        Ok(Ok(())) => metrics.record_success(),
        Ok(Err(err)) => {
            metrics.record_sink_failure();
            warn!(
                pipeline = %event.pipeline,
                status = %event.status,
                error = %err,
                "Failed to record pipeline event"
            );
        }
        Err(_) => {
            metrics.record_sink_failure();
            warn!(
                pipeline = %event.pipeline,
                status = %event.status,
                "Pipeline event sink panicked"
            );
        }
    }
}

enum Dispatch {
    Inline(Arc<dyn PipelineEventSink>),
    Queued {
        tx: RwLock<Option<mpsc::Sender<PipelineEvent>>>,
        worker: Mutex<Option<JoinHandle<()>>>,
        capacity: usize,
    },
}

/// Records pipeline events without ever failing the caller.
///
/// Inline emitters await the sink directly. Queued emitters push onto a
/// bounded channel drained by one background task; a full queue drops the
/// event. Both preserve the order in which one caller emits.
pub struct TelemetryEmitter {
    dispatch: Dispatch,
    metrics: Arc<EmitterMetrics>,
}

impl TelemetryEmitter {
    /// Creates an emitter that awaits the sink on every call.
    #[must_use]
    pub fn inline(sink: Arc<dyn PipelineEventSink>) -> Self {
        Self {
            dispatch: Dispatch::Inline(sink),
            metrics: Arc::new(EmitterMetrics::default()),
        }
    }

    /// Creates an emitter backed by a bounded queue and a background worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn queued(sink: Arc<dyn PipelineEventSink>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<PipelineEvent>(capacity);
        let metrics = Arc::new(EmitterMetrics::default());

        let worker_metrics = metrics.clone();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                deliver(sink.as_ref(), &event, &worker_metrics).await;
            }
            debug!("Telemetry queue closed");
        });

        Self {
            dispatch: Dispatch::Queued {
                tx: RwLock::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
                capacity,
            },
            metrics,
        }
    }

    /// Creates an inline emitter that logs every event.
    #[must_use]
    pub fn logging() -> Self {
        Self::inline(Arc::new(LoggingEventSink::default()))
    }

    /// Records one event. Never fails.
    pub async fn record_pipeline_event(&self, event: PipelineEvent) {
        match &self.dispatch {
            Dispatch::Inline(sink) => deliver(sink.as_ref(), &event, &self.metrics).await,
            Dispatch::Queued { tx, .. } => {
                let sender = tx.read().clone();
                let Some(sender) = sender else {
                    self.metrics.record_drop();
                    warn!(pipeline = %event.pipeline, "Telemetry emitter shut down, event dropped");
                    return;
                };

                if let Err(err) = sender.try_send(event) {
                    self.metrics.record_drop();
                    let (reason, event) = match err {
                        TrySendError::Full(event) => ("queue full", event),
                        TrySendError::Closed(event) => ("queue closed", event),
                    };
                    warn!(
                        pipeline = %event.pipeline,
                        status = %event.status,
                        reason = reason,
                        dropped_total = self.metrics.dropped(),
                        "Pipeline event dropped"
                    );
                }
            }
        }
    }

    /// Returns the emitter metrics.
    #[must_use]
    pub fn metrics(&self) -> &EmitterMetrics {
        &self.metrics
    }

    /// Returns the number of events waiting in the queue (always 0 inline).
    #[must_use]
    pub fn queue_len(&self) -> usize {
        match &self.dispatch {
            Dispatch::Inline(_) => 0,
            Dispatch::Queued { tx, capacity, .. } => tx
                .read()
                .as_ref()
                .map_or(0, |sender| capacity.saturating_sub(sender.capacity())),
        }
    }

    /// Stops accepting events and waits for queued events to reach the sink.
    ///
    /// Later calls to [`record_pipeline_event`](Self::record_pipeline_event)
    /// drop their event. A no-op for inline emitters.
    pub async fn shutdown(&self) {
        if let Dispatch::Queued { tx, worker, .. } = &self.dispatch {
            drop(tx.write().take());
            let handle = worker.lock().take();
            if let Some(handle) = handle {
                if let Err(err) = handle.await {
                    warn!(error = %err, "Telemetry worker terminated abnormally");
                }
            }
        }
    }
}

impl std::fmt::Debug for TelemetryEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.dispatch {
            Dispatch::Inline(_) => "inline",
            Dispatch::Queued { .. } => "queued",
        };
        f.debug_struct("TelemetryEmitter")
            .field("mode", &mode)
            .field("metrics", &self.metrics)
            .finish()
    }
}
