//! Failure triage for provider calls.
//!
//! Every failure maps to exactly one [`FailureKind`]. The kind enriches
//! telemetry only; it does not decide whether a call is retried.

use crate::errors::ProviderError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::io;

/// Classification bucket for a failed provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call timed out or was aborted.
    Timeout,
    /// The provider throttled the call.
    RateLimit,
    /// Transport-level failure.
    Network,
    /// Anything else.
    #[default]
    Provider,
}

impl FailureKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a classifier sees of one failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetails {
    /// HTTP status returned by the provider, if known.
    pub status: Option<u16>,
    /// Provider or transport error code, if known.
    pub code: Option<String>,
    /// Full error message, including causes for chained errors.
    pub message: String,
}

impl FailureDetails {
    /// Creates details carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Extracts details from any displayable error value.
    ///
    /// [`ProviderError`], [`io::Error`], [`anyhow::Error`] and boxed
    /// `std::error::Error` values are inspected, and their cause chains are
    /// searched for a [`ProviderError`] status/code or an I/O error kind.
    /// Any other type contributes its message only; wrap it in
    /// `anyhow::Error` or a boxed error to expose a `ProviderError` source.
    #[must_use]
    pub fn of<E: fmt::Display + 'static>(error: &E) -> Self {
        let any: &dyn Any = error;

        if let Some(err) = any.downcast_ref::<ProviderError>() {
            return Self {
                status: err.status,
                code: err.code.clone(),
                message: err.to_string(),
            };
        }
        if let Some(err) = any.downcast_ref::<anyhow::Error>() {
            return Self::from_chain(format!("{err:#}"), err.chain());
        }
        if let Some(err) = any.downcast_ref::<Box<dyn Error + Send + Sync>>() {
            let root: &(dyn Error + 'static) = &**err;
            return Self::from_chain(chain_message(root), causes(root));
        }
        if let Some(err) = any.downcast_ref::<Box<dyn Error>>() {
            let root: &(dyn Error + 'static) = &**err;
            return Self::from_chain(chain_message(root), causes(root));
        }
        if let Some(err) = any.downcast_ref::<io::Error>() {
            return Self::from_chain(err.to_string(), causes(err));
        }
        #[cfg(feature = "http")]
        if let Some(err) = any.downcast_ref::<reqwest::Error>() {
            let mut details = Self::from_chain(chain_message(err), causes(err));
            details.status = details.status.or_else(|| err.status().map(|s| s.as_u16()));
            if err.is_timeout() && details.code.is_none() {
                details.code = Some("ETIMEDOUT".to_string());
            }
            return details;
        }

        Self::new(error.to_string())
    }

    fn from_chain<'a>(
        message: String,
        chain: impl Iterator<Item = &'a (dyn Error + 'static)>,
    ) -> Self {
        let mut details = Self::new(message);
        for cause in chain {
            if let Some(err) = cause.downcast_ref::<ProviderError>() {
                details.absorb(err);
            } else if let Some(err) = cause.downcast_ref::<io::Error>() {
                // A custom io::Error hides its payload from `source()`.
                let inner = err.get_ref().and_then(|e| e.downcast_ref::<ProviderError>());
                if let Some(inner) = inner {
                    details.absorb(inner);
                }
                if details.code.is_none() {
                    details.code = io_error_code(err.kind()).map(str::to_string);
                }
            }
        }
        details
    }

    fn absorb(&mut self, err: &ProviderError) {
        self.status = self.status.or(err.status);
        if self.code.is_none() {
            self.code.clone_from(&err.code);
        }
    }
}

fn causes<'a>(
    root: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(root), |err: &&'a (dyn Error + 'static)| (*err).source())
}

/// Joins an error and its causes the way `anyhow` prints `{:#}`.
fn chain_message(root: &(dyn Error + 'static)) -> String {
    causes(root)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

fn io_error_code(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        _ => None,
    }
}

/// Maps failure details to a [`FailureKind`].
pub trait FailureClassifier: Send + Sync {
    /// Classifies one failure. Must be total and must not panic.
    fn classify(&self, status: Option<u16>, code: Option<&str>, message: &str) -> FailureKind;

    /// Classifies extracted failure details.
    fn classify_details(&self, details: &FailureDetails) -> FailureKind {
        self.classify(details.status, details.code.as_deref(), &details.message)
    }

    /// Classifies an error value.
    fn classify_error<E: fmt::Display + 'static>(&self, error: &E) -> FailureKind
    where
        Self: Sized,
    {
        self.classify_details(&FailureDetails::of(error))
    }
}

/// Case-insensitive substring rules over the message only.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageHeuristicClassifier;

impl FailureClassifier for MessageHeuristicClassifier {
    fn classify(&self, _status: Option<u16>, _code: Option<&str>, message: &str) -> FailureKind {
        classify_message(message)
    }
}

/// Uses a structured status or error code when one is recognised and falls
/// back to the message heuristic otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredClassifier;

impl StructuredClassifier {
    fn from_status(status: u16) -> Option<FailureKind> {
        match status {
            408 | 504 => Some(FailureKind::Timeout),
            429 => Some(FailureKind::RateLimit),
            _ => None,
        }
    }

    fn from_code(code: &str) -> Option<FailureKind> {
        match code.to_ascii_uppercase().as_str() {
            "ETIMEDOUT" | "ESOCKETTIMEDOUT" => Some(FailureKind::Timeout),
            "ECONNRESET" | "ECONNREFUSED" | "ENOTFOUND" | "EAI_AGAIN" | "EPIPE" => {
                Some(FailureKind::Network)
            }
            _ => None,
        }
    }
}

impl FailureClassifier for StructuredClassifier {
    fn classify(&self, status: Option<u16>, code: Option<&str>, message: &str) -> FailureKind {
        status
            .and_then(Self::from_status)
            .or_else(|| code.and_then(Self::from_code))
            .unwrap_or_else(|| classify_message(message))
    }
}

/// Classifies a message. First match wins:
/// timeout, then rate limit, then network, else provider.
#[must_use]
pub fn classify_message(message: &str) -> FailureKind {
    let message = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

    if has(&["timeout", "timed out", "abort"]) {
        FailureKind::Timeout
    } else if has(&["429", "rate limit"]) {
        FailureKind::RateLimit
    } else if has(&["fetch", "network", "econn"]) {
        FailureKind::Network
    } else {
        FailureKind::Provider
    }
}

/// Classifies an error value by its message alone.
#[must_use]
pub fn classify<E: fmt::Display + ?Sized>(error: &E) -> FailureKind {
    classify_message(&error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_message_examples() {
        assert_eq!(classify_message("Request timed out after 30s"), FailureKind::Timeout);
        assert_eq!(classify_message("HTTP 429 Too Many Requests"), FailureKind::RateLimit);
        assert_eq!(classify_message("read ECONNRESET"), FailureKind::Network);
        assert_eq!(classify_message("invalid api key"), FailureKind::Provider);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify_message("GATEWAY TIMEOUT"), FailureKind::Timeout);
        assert_eq!(classify_message("Rate Limit exceeded"), FailureKind::RateLimit);
        assert_eq!(classify_message("Failed to FETCH"), FailureKind::Network);
    }

    #[test]
    fn test_first_match_wins() {
        // Timeout beats rate limit and network.
        assert_eq!(
            classify_message("network timeout while waiting on 429 retry"),
            FailureKind::Timeout
        );
        assert_eq!(classify_message("429 from upstream fetch"), FailureKind::RateLimit);
        assert_eq!(classify_message("The operation was aborted"), FailureKind::Timeout);
    }

    #[test]
    fn test_empty_message_is_provider() {
        assert_eq!(classify_message(""), FailureKind::Provider);
        assert_eq!(classify(&String::new()), FailureKind::Provider);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let msg = "ECONNREFUSED 127.0.0.1:443";
        let first = classify_message(msg);
        for _ in 0..10 {
            assert_eq!(classify_message(msg), first);
        }
    }

    #[test]
    fn test_structured_status_short_circuits() {
        let classifier = StructuredClassifier;
        let err = ProviderError::new("upstream said no").with_status(429);
        assert_eq!(classifier.classify_error(&err), FailureKind::RateLimit);

        let err = ProviderError::new("bad gateway").with_status(504);
        assert_eq!(classifier.classify_error(&err), FailureKind::Timeout);
    }

    #[test]
    fn test_structured_code_short_circuits() {
        let classifier = StructuredClassifier;
        let err = ProviderError::new("socket hang up").with_code("econnreset");
        assert_eq!(classifier.classify_error(&err), FailureKind::Network);
    }

    #[test]
    fn test_structured_falls_back_to_message() {
        let classifier = StructuredClassifier;
        let err = ProviderError::new("Request timed out").with_status(500);
        assert_eq!(classifier.classify_error(&err), FailureKind::Timeout);

        let err = ProviderError::new("invalid prompt").with_status(400);
        assert_eq!(classifier.classify_error(&err), FailureKind::Provider);
    }

    #[test]
    fn test_heuristic_ignores_structure() {
        let classifier = MessageHeuristicClassifier;
        let err = ProviderError::new("quota exhausted").with_status(429);
        assert_eq!(classifier.classify_error(&err), FailureKind::Provider);
    }

    #[test]
    fn test_anyhow_chain_exposes_status() {
        let err = anyhow::Error::new(ProviderError::new("slow down").with_status(429))
            .context("avatar request failed");
        assert_eq!(FailureDetails::of(&err).status, Some(429));
        assert_eq!(StructuredClassifier.classify_error(&err), FailureKind::RateLimit);
    }

    #[test]
    fn test_anyhow_context_keeps_cause_message() {
        let err = anyhow::Error::new(ProviderError::new("Request timed out"))
            .context("avatar failed");

        let details = FailureDetails::of(&err);
        assert_eq!(details.message, "avatar failed: Request timed out");
        assert_eq!(MessageHeuristicClassifier.classify_error(&err), FailureKind::Timeout);
        assert_eq!(StructuredClassifier.classify_error(&err), FailureKind::Timeout);
    }

    #[test]
    fn test_io_error_kind_maps_to_code() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "connection closed by peer");
        let details = FailureDetails::of(&err);
        assert_eq!(details.code.as_deref(), Some("ECONNRESET"));
        assert_eq!(details.message, "connection closed by peer");
        assert_eq!(StructuredClassifier.classify_error(&err), FailureKind::Network);

        let err = io::Error::new(io::ErrorKind::TimedOut, "no answer");
        assert_eq!(StructuredClassifier.classify_error(&err), FailureKind::Timeout);
    }

    #[test]
    fn test_io_error_wrapping_provider_error() {
        let err = io::Error::new(
            io::ErrorKind::Other,
            ProviderError::new("slow down").with_status(429),
        );
        assert_eq!(FailureDetails::of(&err).status, Some(429));
        assert_eq!(StructuredClassifier.classify_error(&err), FailureKind::RateLimit);
    }

    #[test]
    fn test_boxed_error_walks_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("lipsync upload failed")]
        struct UploadError(#[source] ProviderError);

        let err: Box<dyn Error + Send + Sync> =
            Box::new(UploadError(ProviderError::new("busy").with_code("ECONNREFUSED")));

        let details = FailureDetails::of(&err);
        assert_eq!(details.message, "lipsync upload failed: busy");
        assert_eq!(details.code.as_deref(), Some("ECONNREFUSED"));
        assert_eq!(StructuredClassifier.classify_error(&err), FailureKind::Network);
    }

    #[test]
    fn test_plain_strings_use_message_only() {
        assert_eq!(
            FailureDetails::of(&"HTTP 429 Too Many Requests"),
            FailureDetails::new("HTTP 429 Too Many Requests")
        );
        assert_eq!(
            StructuredClassifier.classify_error(&String::from("fetch failed")),
            FailureKind::Network
        );
    }

    #[test]
    fn test_failure_kind_serialization() {
        assert_eq!(serde_json::to_string(&FailureKind::RateLimit).unwrap(), "\"rate_limit\"");
        assert_eq!(FailureKind::Network.to_string(), "network");
        assert_eq!(FailureKind::default(), FailureKind::Provider);
    }
}
