//! Test assertions for recorded pipeline events.

use crate::telemetry::{EventStatus, PipelineEvent};

/// Asserts the events have exactly the given statuses, in order.
pub fn assert_event_statuses(events: &[PipelineEvent], expected: &[EventStatus]) {
    let actual: Vec<EventStatus> = events.iter().map(|e| e.status).collect();
    assert_eq!(
        actual, expected,
        "Expected event statuses {expected:?}, got {actual:?}"
    );
}

/// Asserts a metadata entry has the expected value.
pub fn assert_meta(event: &PipelineEvent, key: &str, expected: &serde_json::Value) {
    let actual = event.meta(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected metadata {key}={expected}, got {actual:?}. Metadata: {:?}",
        event.metadata
    );
}

/// Asserts the event is a success that needed `attempt` attempts.
pub fn assert_recovered_at(event: &PipelineEvent, attempt: u32) {
    assert!(
        event.is_success(),
        "Expected a success event, got {:?} ({:?})",
        event.status,
        event.error
    );
    assert_meta(event, "attempt", &serde_json::json!(attempt));
    assert_meta(event, "recovered", &serde_json::json!(attempt > 1));
}

/// Asserts the event is the single success recorded for a mock call.
pub fn assert_mock_success(event: &PipelineEvent) {
    assert!(event.is_success(), "Expected a success event, got {:?}", event.status);
    assert_meta(event, "mock", &serde_json::json!(true));
    assert_meta(event, "attempt", &serde_json::json!(1));
    assert_meta(event, "retries", &serde_json::json!(0));
    assert_meta(event, "recovered", &serde_json::json!(false));
}
