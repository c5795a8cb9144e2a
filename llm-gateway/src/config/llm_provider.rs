use std::fmt;
use std::str::FromStr;

use crate::error_handler::ConfigError;

/// Represents the provider (backend) used for large language model inference.
///
/// Each variant is an HTTP dialect of the same capability; the gateway
/// selects one at startup from configuration. Adding more providers
/// (e.g., a local runtime) is done by extending this enum and adding a
/// matching client under `services/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI-compatible chat-completions API.
    OpenAi,
    /// Anthropic-compatible messages API.
    Anthropic,
    /// Gemini-compatible generateContent API.
    Gemini,
}

impl LlmProvider {
    /// Default model id used when configuration does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-3-5-sonnet-latest",
            LlmProvider::Gemini => "gemini-1.5-flash",
        }
    }

    /// Default API endpoint for the provider.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Anthropic => "https://api.anthropic.com",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
        };
        f.write_str(s)
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(LlmProvider::OpenAi),
            "anthropic" | "anthropic-compatible" | "claude" => Ok(LlmProvider::Anthropic),
            "gemini" | "gemini-compatible" | "google" => Ok(LlmProvider::Gemini),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!("openai".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!("Claude".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert_eq!(" gemini ".parse::<LlmProvider>().unwrap(), LlmProvider::Gemini);
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!("mistral".parse::<LlmProvider>().is_err());
    }
}
