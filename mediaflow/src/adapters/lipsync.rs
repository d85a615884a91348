//! Lip-sync video generation.

use super::AdapterContext;
use crate::cancellation::CancellationToken;
use crate::errors::{AdapterError, ProviderError};
use crate::mock::make_mock_id;
use crate::provider::Provider;
use crate::telemetry::Metadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const OPERATION: &str = "Lipsync generation";

/// Client for a lip-sync provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LipsyncClient: Send + Sync {
    /// Creates a generation and waits for its output.
    async fn create_generation(
        &self,
        request: &LipsyncRequest,
    ) -> Result<LipsyncResponse, ProviderError>;
}

/// A lip-sync request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LipsyncRequest {
    /// Source video.
    pub video_url: String,
    /// Driving audio.
    pub audio_url: String,
    /// Provider model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Initiating user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl LipsyncRequest {
    /// Creates a request pairing `video_url` with `audio_url`.
    #[must_use]
    pub fn new(video_url: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            audio_url: audio_url.into(),
            ..Self::default()
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
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
        if let Some(model) = &self.model {
            metadata.insert("model".to_string(), serde_json::json!(model));
        }
        metadata
    }
}

/// Raw provider response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LipsyncResponse {
    /// Generation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Provider-reported status.
    #[serde(default)]
    pub status: String,
    /// Output video, absent until the generation completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

/// A finished lip-sync video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipsyncResult {
    /// Output video URL.
    pub video_url: String,
    /// Provider generation id.
    pub generation_id: String,
}

/// Produces lip-synced videos through a [`LipsyncClient`].
#[derive(Clone)]
pub struct LipsyncGenerator {
    client: Arc<dyn LipsyncClient>,
    context: AdapterContext,
}

impl LipsyncGenerator {
    /// Pipeline name written into telemetry.
    pub const PIPELINE: &'static str = "lipsync.create";

    /// Creates a generator.
    #[must_use]
    pub fn new(client: Arc<dyn LipsyncClient>, context: AdapterContext) -> Self {
        Self { client, context }
    }

    /// Creates one lip-sync video.
    pub async fn create(&self, request: LipsyncRequest) -> Result<LipsyncResult, AdapterError> {
        self.run(request, None).await
    }

    /// Creates one lip-sync video, stopping early if `token` fires.
    pub async fn create_with_cancellation(
        &self,
        request: LipsyncRequest,
        token: &CancellationToken,
    ) -> Result<LipsyncResult, AdapterError> {
        self.run(request, Some(token)).await
    }

    async fn run(
        &self,
        request: LipsyncRequest,
        token: Option<&CancellationToken>,
    ) -> Result<LipsyncResult, AdapterError> {
        let options = self.context.options(
            Self::PIPELINE,
            Provider::SyncLabs,
            request.user_id.as_deref(),
            request.metadata(),
        );

        if self.context.mock_enabled() {
            self.context.orchestrator().record_mock_success(&options).await;
            return Ok(LipsyncResult {
                video_url: self.context.artifacts().video_url.clone(),
                generation_id: make_mock_id("lipsync"),
            });
        }

        let response = self
            .context
            .call(OPERATION, &options, token, || self.client.create_generation(&request))
            .await?;

        let video_url = response
            .output_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AdapterError::missing_payload(OPERATION, "No video generated"))?;

        Ok(LipsyncResult {
            video_url,
            generation_id: response.id.unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for LipsyncGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LipsyncGenerator")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
