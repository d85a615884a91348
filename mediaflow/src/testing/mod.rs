//! Testing utilities for provider calls.
//!
//! This module provides:
//! - Scripted work closures that fail a set number of times
//! - A harness wiring an orchestrator to a collecting sink
//! - Assertions over recorded pipeline events

mod assertions;
mod fixtures;
mod work;

pub use assertions::{
    assert_event_statuses, assert_meta, assert_mock_success, assert_recovered_at,
};
pub use fixtures::TestHarness;
pub use work::ScriptedWork;

pub use crate::telemetry::CollectingEventSink;
