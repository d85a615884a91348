//! Avatar image generation.

use super::AdapterContext;
use crate::cancellation::CancellationToken;
use crate::errors::{AdapterError, ProviderError};
use crate::mock::make_mock_id;
use crate::provider::Provider;
use crate::telemetry::Metadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const OPERATION: &str = "Avatar generation";

/// Client for an image generation provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerationClient: Send + Sync {
    /// Submits one generation request.
    async fn generate(
        &self,
        request: &AvatarRequest,
    ) -> Result<ImageGenerationResponse, ProviderError>;
}

/// An avatar generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarRequest {
    /// Text prompt.
    pub prompt: String,
    /// Optional style preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Optional image size (e.g. "square_hd").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    /// Initiating user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AvatarRequest {
    /// Creates a request for `prompt`.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the style.
    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
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
        metadata.insert("promptLength".to_string(), serde_json::json!(self.prompt.chars().count()));
        if let Some(style) = &self.style {
            metadata.insert("style".to_string(), serde_json::json!(style));
        }
        if let Some(size) = &self.image_size {
            metadata.insert("imageSize".to_string(), serde_json::json!(size));
        }
        metadata
    }
}

/// One image in a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Image URL.
    pub url: String,
    /// Width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Raw provider response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    /// Generated images; may be empty.
    #[serde(default)]
    pub images: Vec<GeneratedImage>,
    /// Provider request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// A generated avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarResult {
    /// Image URL (a data URL in mock mode).
    pub image_url: String,
    /// Provider request id.
    pub request_id: String,
}

/// Generates avatar images through an [`ImageGenerationClient`].
#[derive(Clone)]
pub struct AvatarGenerator {
    client: Arc<dyn ImageGenerationClient>,
    context: AdapterContext,
}

impl AvatarGenerator {
    /// Pipeline name written into telemetry.
    pub const PIPELINE: &'static str = "avatar.generate";

    /// Creates a generator.
    #[must_use]
    pub fn new(client: Arc<dyn ImageGenerationClient>, context: AdapterContext) -> Self {
        Self { client, context }
    }

    /// Generates one avatar.
    pub async fn generate(&self, request: AvatarRequest) -> Result<AvatarResult, AdapterError> {
        self.run(request, None).await
    }

    /// Generates one avatar, stopping early if `token` fires.
    pub async fn generate_with_cancellation(
        &self,
        request: AvatarRequest,
        token: &CancellationToken,
    ) -> Result<AvatarResult, AdapterError> {
        self.run(request, Some(token)).await
    }

    async fn run(
        &self,
        request: AvatarRequest,
        token: Option<&CancellationToken>,
    ) -> Result<AvatarResult, AdapterError> {
        let options = self.context.options(
            Self::PIPELINE,
            Provider::Fal,
            request.user_id.as_deref(),
            request.metadata(),
        );

        if self.context.mock_enabled() {
            self.context.orchestrator().record_mock_success(&options).await;
            return Ok(AvatarResult {
                image_url: self.context.artifacts().image_url.clone(),
                request_id: make_mock_id("avatar"),
            });
        }

        let response = self
            .context
            .call(OPERATION, &options, token, || self.client.generate(&request))
            .await?;

        let image = response
            .images
            .into_iter()
            .find(|image| !image.url.is_empty())
            .ok_or_else(|| AdapterError::missing_payload(OPERATION, "No image generated"))?;

        Ok(AvatarResult {
            image_url: image.url,
            request_id: response.request_id.unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for AvatarGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarGenerator")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
