//! Bounded retries with linear backoff and per-attempt telemetry.

use super::options::{backoff_delay, RetryOptions};
use crate::cancellation::CancellationToken;
use crate::failure::{FailureClassifier, FailureDetails, StructuredClassifier};
use crate::mock::record_mock_provider_success;
use crate::telemetry::{PipelineEvent, TelemetryEmitter};
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Why a cancellable retry sequence ended without a result.
#[derive(Debug, Error)]
pub enum RetryAbort<E> {
    /// Every attempt failed; this is the last failure, unmodified.
    #[error("{0}")]
    Failed(E),

    /// The token fired or the deadline elapsed.
    #[error("cancelled after {attempts} attempt(s): {reason}")]
    Cancelled {
        /// Attempts started before the sequence stopped.
        attempts: u32,
        /// Cancellation reason.
        reason: String,
    },
}

impl<E> RetryAbort<E> {
    /// Returns the provider failure, if the sequence ran out of attempts.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Cancelled { .. } => None,
        }
    }

    /// Returns true if the sequence was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Something that can interrupt a retry sequence.
trait Interrupt: Sync {
    type Reason: fmt::Display + Send;

    /// Returns the reason if the interrupt has already fired.
    fn fired(&self) -> Option<Self::Reason>;

    /// Completes when the interrupt fires.
    fn wait(&self) -> BoxFuture<'_, Self::Reason>;
}

/// Never fires.
struct Uninterrupted;

impl Interrupt for Uninterrupted {
    type Reason = Infallible;

    fn fired(&self) -> Option<Infallible> {
        None
    }

    fn wait(&self) -> BoxFuture<'_, Infallible> {
        Box::pin(std::future::pending())
    }
}

/// Fires on token cancellation or once the deadline passes.
struct TokenInterrupt<'a> {
    token: &'a CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl TokenInterrupt<'_> {
    fn token_reason(&self) -> String {
        self.token
            .reason()
            .unwrap_or_else(|| "cancelled".to_string())
    }

    fn deadline_reason(limit: Duration) -> String {
        format!("deadline of {}ms exceeded", limit.as_millis())
    }
}

impl Interrupt for TokenInterrupt<'_> {
    type Reason = String;

    fn fired(&self) -> Option<String> {
        if self.token.is_cancelled() {
            return Some(self.token_reason());
        }
        match self.deadline {
            Some((at, limit)) if Instant::now() >= at => Some(Self::deadline_reason(limit)),
            _ => None,
        }
    }

    fn wait(&self) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match self.deadline {
                Some((at, limit)) => {
                    tokio::select! {
                        biased;
                        () = self.token.cancelled() => self.token_reason(),
                        () = tokio::time::sleep_until(at) => Self::deadline_reason(limit),
                    }
                }
                None => {
                    self.token.cancelled().await;
                    self.token_reason()
                }
            }
        })
    }
}

enum Stop<E, R> {
    Failed(E),
    Interrupted { attempts: u32, reason: R },
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Wraps provider calls with retries, failure triage and telemetry.
///
/// Cheap to clone; clones share the emitter and classifier.
#[derive(Clone)]
pub struct RetryOrchestrator {
    emitter: Arc<TelemetryEmitter>,
    classifier: Arc<dyn FailureClassifier>,
}

impl RetryOrchestrator {
    /// Creates an orchestrator with the structured classifier.
    #[must_use]
    pub fn new(emitter: Arc<TelemetryEmitter>) -> Self {
        Self {
            emitter,
            classifier: Arc::new(StructuredClassifier),
        }
    }

    /// Replaces the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Returns the telemetry emitter.
    #[must_use]
    pub fn emitter(&self) -> &Arc<TelemetryEmitter> {
        &self.emitter
    }

    /// Runs `work` up to `retries + 1` times.
    ///
    /// Emits one event per attempt. Returns the first success, or the last
    /// failure exactly as `work` produced it. `options.deadline` is ignored
    /// here; see [`run_with_cancellation`](Self::run_with_cancellation).
    ///
    /// Failures are classified through [`FailureDetails::of`], so any
    /// displayable error type works.
    pub async fn run_with_retries<T, E, F, Fut>(
        &self,
        options: &RetryOptions,
        work: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + 'static,
    {
        match self.execute(options, work, &Uninterrupted).await {
            Ok(value) => Ok(value),
            Err(Stop::Failed(err)) => Err(err),
            Err(Stop::Interrupted { reason, .. }) => match reason {},
        }
    }

    /// Like [`run_with_retries`](Self::run_with_retries), but stops when
    /// `token` fires or `options.deadline` elapses.
    ///
    /// An in-flight attempt is dropped and recorded as one error event with
    /// `cancelled: true`. A pending backoff sleep is cut short without an
    /// extra event.
    pub async fn run_with_cancellation<T, E, F, Fut>(
        &self,
        options: &RetryOptions,
        token: &CancellationToken,
        work: F,
    ) -> Result<T, RetryAbort<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + 'static,
    {
        let interrupt = TokenInterrupt {
            token,
            deadline: options.deadline.map(|limit| (Instant::now() + limit, limit)),
        };

        self.execute(options, work, &interrupt)
            .await
            .map_err(|stop| match stop {
                Stop::Failed(err) => RetryAbort::Failed(err),
                Stop::Interrupted { attempts, reason } => {
                    RetryAbort::Cancelled { attempts, reason }
                }
            })
    }

    /// Records a mock success for `options` without running anything.
    pub async fn record_mock_success(&self, options: &RetryOptions) {
        record_mock_provider_success(&self.emitter, options).await;
    }

    fn attempt_event(
        options: &RetryOptions,
        event: PipelineEvent,
        attempt: u32,
        started: Instant,
    ) -> PipelineEvent {
        event
            .with_duration_ms(elapsed_ms(started))
            .with_user_id(options.user_id.clone())
            .with_metadata(options.metadata.clone())
            .with_entry("provider", serde_json::json!(options.provider))
            .with_entry("attempt", serde_json::json!(attempt))
            .with_entry("retries", serde_json::json!(options.retries))
    }

    async fn execute<T, E, F, Fut, I>(
        &self,
        options: &RetryOptions,
        mut work: F,
        interrupt: &I,
    ) -> Result<T, Stop<E, I::Reason>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + 'static,
        I: Interrupt,
    {
        let total = options.total_attempts();
        let delay = options.base_delay();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if let Some(reason) = interrupt.fired() {
                return Err(Stop::Interrupted {
                    attempts: attempt - 1,
                    reason,
                });
            }

            let span = info_span!(
                "provider_attempt",
                pipeline = %options.pipeline,
                provider = %options.provider,
                attempt,
            );
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                reason = interrupt.wait() => Err(reason),
                result = work().instrument(span) => Ok(result),
            };

            match outcome {
                Ok(Ok(value)) => {
                    let recovered = attempt > 1;
                    let success = PipelineEvent::success(&options.pipeline);
                    let event = Self::attempt_event(options, success, attempt, started)
                        .with_entry("recovered", serde_json::json!(recovered));
                    self.emitter.record_pipeline_event(event).await;

                    if recovered {
                        info!(pipeline = %options.pipeline, attempt, "Provider call recovered");
                    }
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    let details = FailureDetails::of(&err);
                    let kind = self.classifier.classify_details(&details);
                    let message = details.message;
                    warn!(
                        pipeline = %options.pipeline,
                        provider = %options.provider,
                        attempt,
                        total,
                        failure_type = %kind,
                        error = %message,
                        "Provider attempt failed"
                    );

                    let failure = PipelineEvent::failure(&options.pipeline, message);
                    let event = Self::attempt_event(options, failure, attempt, started)
                        .with_entry("failureType", serde_json::json!(kind));
                    self.emitter.record_pipeline_event(event).await;

                    if attempt >= total {
                        return Err(Stop::Failed(err));
                    }
                }
                Err(reason) => {
                    let message = format!("Attempt aborted: {reason}");
                    let kind = self.classifier.classify(None, None, &message);
                    warn!(
                        pipeline = %options.pipeline,
                        attempt,
                        reason = %reason,
                        "Provider attempt cancelled"
                    );

                    let failure = PipelineEvent::failure(&options.pipeline, message);
                    let event = Self::attempt_event(options, failure, attempt, started)
                        .with_entry("failureType", serde_json::json!(kind))
                        .with_entry("cancelled", serde_json::json!(true));
                    self.emitter.record_pipeline_event(event).await;
                    return Err(Stop::Interrupted {
                        attempts: attempt,
                        reason,
                    });
                }
            }

            let wait = backoff_delay(delay, attempt);
            debug!(
                pipeline = %options.pipeline,
                attempt,
                delay_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Backing off before next attempt"
            );
            tokio::select! {
                biased;
                reason = interrupt.wait() => {
                    return Err(Stop::Interrupted { attempts: attempt, reason });
                }
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}

impl fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}
