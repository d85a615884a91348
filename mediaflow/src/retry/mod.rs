//! Retry orchestration for provider calls.
//!
//! A call is attempted up to `retries + 1` times. The wait after attempt
//! `n` is `base_delay × n` (linear, not exponential). Each attempt emits one
//! pipeline event; the final failure is returned exactly as produced.

mod options;
mod orchestrator;

pub use options::{
    backoff_delay, RetryOptions, DEFAULT_BASE_DELAY_MS, DEFAULT_RETRIES, MIN_BASE_DELAY_MS,
};
pub use orchestrator::{RetryAbort, RetryOrchestrator};
