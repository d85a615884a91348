//! Adapters wired the way an application would wire them.

use async_trait::async_trait;
use mediaflow::prelude::*;
use mediaflow::telemetry::Metadata;
use mediaflow::testing::{assert_event_statuses, assert_mock_success};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Fails with a rate limit once, then answers.
#[derive(Default)]
struct FlakyImageClient {
    calls: AtomicU32,
}

#[async_trait]
impl ImageGenerationClient for FlakyImageClient {
    async fn generate(
        &self,
        request: &AvatarRequest,
    ) -> Result<mediaflow::adapters::ImageGenerationResponse, ProviderError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ProviderError::new("Too Many Requests").with_status(429));
        }
        Ok(mediaflow::adapters::ImageGenerationResponse {
            images: vec![mediaflow::adapters::GeneratedImage {
                url: format!("https://cdn.example/{}.png", request.prompt.replace(' ', "-")),
                width: None,
                height: None,
            }],
            request_id: Some("req-42".to_string()),
        })
    }
}

/// Counts calls and never answers with a transcript.
#[derive(Default)]
struct SilentTranscriptionClient {
    calls: AtomicU32,
}

#[async_trait]
impl TranscriptionClient for SilentTranscriptionClient {
    async fn transcribe(
        &self,
        _request: &TranscriptionRequest,
    ) -> Result<mediaflow::adapters::TranscriptionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(mediaflow::adapters::TranscriptionResponse::default())
    }
}

/// Hangs until dropped.
struct HangingLipsyncClient;

#[async_trait]
impl LipsyncClient for HangingLipsyncClient {
    async fn create_generation(
        &self,
        _request: &LipsyncRequest,
    ) -> Result<mediaflow::adapters::LipsyncResponse, ProviderError> {
        std::future::pending().await
    }
}

fn context(sink: &Arc<CollectingEventSink>, config: &MediaflowConfig) -> AdapterContext {
    let emitter = Arc::new(TelemetryEmitter::inline(sink.clone()));
    AdapterContext::from_config(config, emitter)
}

#[tokio::test(start_paused = true)]
async fn avatar_generation_recovers_from_rate_limit() {
    let sink = Arc::new(CollectingEventSink::new());
    let client = Arc::new(FlakyImageClient::default());
    let generator = AvatarGenerator::new(client.clone(), context(&sink, &MediaflowConfig::new()));

    let started = tokio::time::Instant::now();
    let result = assert_ok!(
        generator
            .generate(AvatarRequest::new("red fox").with_user_id("user-1"))
            .await
    );

    assert_eq!(result.image_url, "https://cdn.example/red-fox.png");
    assert_eq!(result.request_id, "req-42");
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(400));

    let events = sink.events();
    assert_event_statuses(&events, &[EventStatus::Error, EventStatus::Success]);
    assert_eq!(events[0].meta("failureType"), Some(&serde_json::json!("rate_limit")));
    assert!(events.iter().all(|e| e.user_id.as_deref() == Some("user-1")));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["imageUrl"], "https://cdn.example/red-fox.png");
    assert_eq!(json["requestId"], "req-42");
}

#[tokio::test(start_paused = true)]
async fn missing_transcript_is_not_retried() {
    let sink = Arc::new(CollectingEventSink::new());
    let client = Arc::new(SilentTranscriptionClient::default());
    let transcriber = Transcriber::new(client.clone(), context(&sink, &MediaflowConfig::new()));

    let err = assert_err!(
        transcriber
            .transcribe(TranscriptionRequest::new(vec![1, 2], "memo.m4a"))
            .await
    );

    assert!(err.is_validation());
    assert_eq!(err.user_message(), "No transcript returned");
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_event_statuses(&sink.events(), &[EventStatus::Success]);
}

#[tokio::test]
async fn mock_mode_from_configuration_bypasses_every_provider() {
    let config = MediaflowConfig::from_lookup(|key| {
        (key == "MEDIAFLOW_MOCK_PROVIDERS").then(|| "On".to_string())
    })
    .unwrap();
    let sink = Arc::new(CollectingEventSink::new());
    let context = context(&sink, &config);

    let image_client = Arc::new(FlakyImageClient::default());
    let transcription_client = Arc::new(SilentTranscriptionClient::default());

    let avatar = assert_ok!(
        AvatarGenerator::new(image_client.clone(), context.clone())
            .generate(AvatarRequest::new("x"))
            .await
    );
    let lipsync = assert_ok!(
        LipsyncGenerator::new(Arc::new(HangingLipsyncClient), context.clone())
            .create(LipsyncRequest::new("v", "a"))
            .await
    );
    let transcript = assert_ok!(
        Transcriber::new(transcription_client.clone(), context)
            .transcribe(TranscriptionRequest::new(Vec::new(), "a.wav"))
            .await
    );

    assert!(avatar.image_url.starts_with("data:image/png;base64,"));
    assert!(lipsync.generation_id.starts_with("mock-lipsync-"));
    assert_eq!(transcript.transcript, "This is a mock transcript.");
    assert_eq!(image_client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(transcription_client.calls.load(Ordering::SeqCst), 0);

    let events = sink.events();
    assert_eq!(events.len(), 3);
    for event in &events {
        assert_mock_success(event);
    }
    let pipelines: Vec<_> = events.iter().map(|e| e.pipeline.as_str()).collect();
    assert_eq!(pipelines, ["avatar.generate", "lipsync.create", "transcription.create"]);
}

#[tokio::test]
async fn env_mock_mode_toggles_without_rebuilding() {
    let var = "MEDIAFLOW_IT_MOCK_TOGGLE";
    std::env::remove_var(var);

    let sink = Arc::new(CollectingEventSink::new());
    let client = Arc::new(SilentTranscriptionClient::default());
    let context = context(&sink, &MediaflowConfig::new())
        .with_mock_mode(Arc::new(EnvMockMode::with_var(var)));
    let transcriber = Transcriber::new(client.clone(), context);

    assert_err!(
        transcriber
            .transcribe(TranscriptionRequest::new(vec![0], "a.wav"))
            .await
    );

    std::env::set_var(var, "yes");
    assert_ok!(
        transcriber
            .transcribe(TranscriptionRequest::new(vec![0], "a.wav"))
            .await
    );
    std::env::remove_var(var);

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_a_hanging_provider() {
    let sink = Arc::new(CollectingEventSink::new());
    let generator = LipsyncGenerator::new(
        Arc::new(HangingLipsyncClient),
        context(&sink, &MediaflowConfig::new()),
    );

    let token = Arc::new(CancellationToken::new());
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            token.cancel("request aborted by client");
        })
    };

    let err = assert_err!(
        generator
            .create_with_cancellation(LipsyncRequest::new("v", "a"), &token)
            .await
    );
    canceller.await.unwrap();

    match err {
        AdapterError::Cancelled { reason, .. } => assert_eq!(reason, "request aborted by client"),
        other => panic!("expected cancellation, got {other:?}"),
    }

    let events = sink.events();
    assert_event_statuses(&events, &[EventStatus::Error]);
    assert_eq!(events[0].meta("cancelled"), Some(&serde_json::json!(true)));
    assert_eq!(events[0].meta("failureType"), Some(&serde_json::json!("timeout")));
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_whole_sequence() {
    let harness = mediaflow::testing::TestHarness::new();
    let work = mediaflow::testing::ScriptedWork::failing("HTTP 502");
    let options = RetryOptions::new("avatar.generate", Provider::Fal)
        .with_retries(5)
        .with_metadata(Metadata::new())
        .with_deadline(Duration::from_millis(1000));

    let token = CancellationToken::new();
    let abort = assert_err!(
        harness
            .orchestrator
            .run_with_cancellation(&options, &token, || work.call())
            .await
    );

    // Attempts start at 0, 400 and 1200ms; the third never begins.
    assert!(abort.is_cancelled());
    assert_eq!(work.calls(), 2);
    assert_eq!(harness.events().len(), 2);
}
