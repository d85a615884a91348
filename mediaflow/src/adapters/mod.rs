//! Provider adapters.
//!
//! Each adapter wraps one provider operation. A call either short-circuits
//! to a mock artifact, or runs the provider client through the
//! [`RetryOrchestrator`] and validates the returned payload.

mod avatar;
mod lipsync;
mod transcription;

pub use avatar::{
    AvatarGenerator, AvatarRequest, AvatarResult, GeneratedImage, ImageGenerationClient,
    ImageGenerationResponse,
};
pub use lipsync::{LipsyncClient, LipsyncGenerator, LipsyncRequest, LipsyncResponse, LipsyncResult};
pub use transcription::{
    TranscriptResult, Transcriber, TranscriptionClient, TranscriptionRequest, TranscriptionResponse,
};

use crate::cancellation::CancellationToken;
use crate::config::{MediaflowConfig, RetryDefaults};
use crate::errors::{AdapterError, ProviderError};
use crate::mock::{MockArtifacts, MockModeSource, StaticMockMode};
use crate::provider::Provider;
use crate::retry::{RetryAbort, RetryOptions, RetryOrchestrator};
use crate::telemetry::{Metadata, TelemetryEmitter};
use std::future::Future;
use std::sync::Arc;

/// Shared wiring for every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    orchestrator: RetryOrchestrator,
    mock_mode: Arc<dyn MockModeSource>,
    retry: RetryDefaults,
    artifacts: MockArtifacts,
}

impl AdapterContext {
    /// Creates a context with mock mode off and default retries.
    #[must_use]
    pub fn new(orchestrator: RetryOrchestrator) -> Self {
        Self {
            orchestrator,
            mock_mode: Arc::new(StaticMockMode(false)),
            retry: RetryDefaults::default(),
            artifacts: MockArtifacts::default(),
        }
    }

    /// Builds a context from configuration and an existing emitter.
    #[must_use]
    pub fn from_config(config: &MediaflowConfig, emitter: Arc<TelemetryEmitter>) -> Self {
        Self::new(RetryOrchestrator::new(emitter))
            .with_mock_mode(config.mock_mode_source())
            .with_retry_defaults(config.retry)
    }

    /// Sets the mock mode source.
    #[must_use]
    pub fn with_mock_mode(mut self, mock_mode: Arc<dyn MockModeSource>) -> Self {
        self.mock_mode = mock_mode;
        self
    }

    /// Sets the retry defaults.
    #[must_use]
    pub fn with_retry_defaults(mut self, retry: RetryDefaults) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the mock artifacts.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: MockArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Returns the orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    /// Returns the mock artifacts.
    #[must_use]
    pub fn artifacts(&self) -> &MockArtifacts {
        &self.artifacts
    }

    /// Returns true if the next call should be mocked.
    #[must_use]
    pub fn mock_enabled(&self) -> bool {
        self.mock_mode.is_enabled()
    }

    pub(crate) fn options(
        &self,
        pipeline: &str,
        provider: Provider,
        user_id: Option<&str>,
        metadata: Metadata,
    ) -> RetryOptions {
        self.retry
            .apply(RetryOptions::new(pipeline, provider))
            .with_user_id(user_id)
            .with_metadata(metadata)
    }

    /// Runs `work` with retries, optionally under a cancellation token.
    pub(crate) async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        options: &RetryOptions,
        token: Option<&CancellationToken>,
        work: F,
    ) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        match token {
            None => self
                .orchestrator
                .run_with_retries(options, work)
                .await
                .map_err(|err| AdapterError::provider(operation, err)),
            Some(token) => self
                .orchestrator
                .run_with_cancellation(options, token, work)
                .await
                .map_err(|abort| match abort {
                    RetryAbort::Failed(err) => AdapterError::provider(operation, err),
                    RetryAbort::Cancelled { reason, .. } => {
                        AdapterError::cancelled(operation, reason)
                    }
                }),
        }
    }
}

impl std::fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterContext")
            .field("mock_enabled", &self.mock_enabled())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
