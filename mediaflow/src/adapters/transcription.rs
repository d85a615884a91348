//! Speech transcription.

use super::AdapterContext;
use crate::cancellation::CancellationToken;
use crate::errors::{AdapterError, ProviderError};
use crate::provider::Provider;
use crate::telemetry::Metadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const OPERATION: &str = "Transcription";

/// Client for a speech-to-text provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    /// Transcribes one audio file.
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, ProviderError>;
}

/// A transcription request.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    /// Raw audio bytes.
    #[serde(skip)]
    pub audio: Vec<u8>,
    /// File name sent to the provider; its extension selects the decoder.
    pub file_name: String,
    /// Language hint (ISO 639-1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Initiating user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TranscriptionRequest {
    /// Creates a request for `audio`.
    #[must_use]
    pub fn new(audio: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            audio,
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Sets the language hint.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("fileName".to_string(), serde_json::json!(self.file_name));
        metadata.insert("bytes".to_string(), serde_json::json!(self.audio.len()));
        metadata
    }
}

impl fmt::Debug for TranscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionRequest")
            .field("bytes", &self.audio.len())
            .field("file_name", &self.file_name)
            .field("language", &self.language)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Raw provider response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    /// Transcribed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Audio duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Detected language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A finished transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Transcript text.
    pub transcript: String,
    /// Audio duration in seconds, when reported.
    pub duration: Option<f64>,
    /// Detected language, falling back to the request hint.
    pub language: Option<String>,
}

/// Transcribes audio through a [`TranscriptionClient`].
#[derive(Clone)]
pub struct Transcriber {
    client: Arc<dyn TranscriptionClient>,
    context: AdapterContext,
}

impl Transcriber {
    /// Pipeline name written into telemetry.
    pub const PIPELINE: &'static str = "transcription.create";

    /// Creates a transcriber.
    #[must_use]
    pub fn new(client: Arc<dyn TranscriptionClient>, context: AdapterContext) -> Self {
        Self { client, context }
    }

    /// Transcribes one audio file.
    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptResult, AdapterError> {
        self.run(request, None).await
    }

    /// Transcribes one audio file, stopping early if `token` fires.
    pub async fn transcribe_with_cancellation(
        &self,
        request: TranscriptionRequest,
        token: &CancellationToken,
    ) -> Result<TranscriptResult, AdapterError> {
        self.run(request, Some(token)).await
    }

    async fn run(
        &self,
        request: TranscriptionRequest,
        token: Option<&CancellationToken>,
    ) -> Result<TranscriptResult, AdapterError> {
        let options = self.context.options(
            Self::PIPELINE,
            Provider::OpenAi,
            request.user_id.as_deref(),
            request.metadata(),
        );

        if self.context.mock_enabled() {
            self.context.orchestrator().record_mock_success(&options).await;
            let artifacts = self.context.artifacts();
            return Ok(TranscriptResult {
                transcript: artifacts.transcript.clone(),
                duration: Some(artifacts.transcript_duration),
                language: Some(artifacts.transcript_language.clone()),
            });
        }

        let response = self
            .context
            .call(OPERATION, &options, token, || self.client.transcribe(&request))
            .await?;

        let transcript = response
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AdapterError::missing_payload(OPERATION, "No transcript returned"))?;

        Ok(TranscriptResult {
            transcript,
            duration: response.duration,
            language: response.language.or(request.language),
        })
    }
}

impl fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcriber")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
