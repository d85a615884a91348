//! Scripted work closures.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::Instant;

use crate::errors::ProviderError;

/// A unit of work that fails a fixed number of times before succeeding.
///
/// Each failure message ends with the attempt number (`"... #2"`), so tests
/// can tell which attempt produced a given error.
#[derive(Debug)]
pub struct ScriptedWork {
    message: String,
    failures: Option<u32>,
    value: String,
    calls: AtomicU32,
    started_at: Mutex<Vec<Instant>>,
}

impl ScriptedWork {
    /// Work that always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failures: None,
            value: String::new(),
            calls: AtomicU32::new(0),
            started_at: Mutex::new(Vec::new()),
        }
    }

    /// Work that fails `failures` times, then returns `value`.
    #[must_use]
    pub fn recovering(failures: u32, message: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            failures: Some(failures),
            value: value.into(),
            ..Self::failing(message)
        }
    }

    /// Runs one attempt.
    pub async fn call(&self) -> Result<String, ProviderError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.started_at.lock().push(Instant::now());

        match self.failures {
            Some(failures) if attempt > failures => Ok(self.value.clone()),
            _ => Err(ProviderError::new(format!("{} #{attempt}", self.message))),
        }
    }

    /// Returns how many times the work ran.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the start time of each attempt.
    #[must_use]
    pub fn started_at(&self) -> Vec<Instant> {
        self.started_at.lock().clone()
    }
}
