//! Known generation providers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An external generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Image generation (avatars).
    Fal,
    /// Lip-sync video generation.
    SyncLabs,
    /// Speech transcription.
    OpenAi,
}

impl Provider {
    /// Returns the identifier written into telemetry.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fal => "fal",
            Self::SyncLabs => "synclabs",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for provider in [Provider::Fal, Provider::SyncLabs, Provider::OpenAi] {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{provider}\""));
        }
    }
}
