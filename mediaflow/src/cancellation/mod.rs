//! Cooperative cancellation for provider call sequences.

mod token;

pub use token::CancellationToken;
