//! # Mediaflow
//!
//! Resilience layer for media generation providers.
//!
//! Every provider call (avatar images, lip-sync video, transcription) goes
//! through the same path:
//!
//! - **Mock substitution**: with mock mode on, a deterministic artifact is
//!   returned and a single success event is recorded
//! - **Retries**: bounded attempts with linear backoff
//! - **Failure triage**: each failure is classified as timeout, rate limit,
//!   network or provider
//! - **Telemetry**: one event per attempt, written through a sink that
//!   never fails the call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mediaflow::prelude::*;
//!
//! let emitter = Arc::new(TelemetryEmitter::inline(Arc::new(LoggingEventSink::default())));
//! let context = AdapterContext::from_config(&MediaflowConfig::from_env()?, emitter);
//! let avatars = AvatarGenerator::new(Arc::new(FalClient::new(key)), context);
//!
//! let avatar = avatars.generate(AvatarRequest::new("a red fox").with_user_id(user)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod failure;
pub mod mock;
pub mod observability;
pub mod provider;
pub mod retry;
pub mod telemetry;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{
        AdapterContext, AvatarGenerator, AvatarRequest, AvatarResult, ImageGenerationClient,
        LipsyncClient, LipsyncGenerator, LipsyncRequest, LipsyncResult, TranscriptResult,
        Transcriber, TranscriptionClient, TranscriptionRequest,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{MediaflowConfig, RetryDefaults, TelemetryConfig, TelemetryMode};
    pub use crate::errors::{AdapterError, ConfigError, MediaflowError, ProviderError, SinkError};
    pub use crate::failure::{
        classify, FailureClassifier, FailureDetails, FailureKind, MessageHeuristicClassifier,
        StructuredClassifier,
    };
    pub use crate::mock::{
        is_mock_mode_enabled, make_mock_data_url, make_mock_id, make_mock_png_data_url,
        record_mock_provider_success, EnvMockMode, MockArtifacts, MockModeSource, StaticMockMode,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::provider::Provider;
    pub use crate::retry::{RetryAbort, RetryOptions, RetryOrchestrator};
    pub use crate::telemetry::{
        CollectingEventSink, EventStatus, LoggingEventSink, NoOpEventSink, PipelineEvent,
        PipelineEventSink, PipelineStatsSink, TelemetryEmitter,
    };
}
