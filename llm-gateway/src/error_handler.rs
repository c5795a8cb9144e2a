//! Error types and validation helpers for `llm-gateway`.
//!
//! This module defines the unified error surface of the gateway and small,
//! reusable helpers for reading/validating environment variables.
//!
//! Provider failures keep the upstream HTTP status so callers can
//! distinguish a misconfigured provider from an upstream fault or a 429.

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/// Root error type for every gateway operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Provider-level failure (bad config, non-2xx status, decode).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Transport failure before any HTTP status was produced.
    #[error("http transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Environment/config-driven setup failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// True when the upstream provider answered with HTTP 429.
    ///
    /// Local admission never produces this - it waits instead.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            GatewayError::Provider(ProviderError {
                kind: ProviderErrorKind::RateLimited { .. },
                ..
            })
        )
    }

    /// True for errors caused by gateway misconfiguration rather than an
    /// upstream fault (wrong endpoint, missing key, unknown provider).
    pub fn is_provider_config(&self) -> bool {
        matches!(
            self,
            GatewayError::Config(_)
                | GatewayError::Provider(ProviderError {
                    kind: ProviderErrorKind::MissingApiKey
                        | ProviderErrorKind::InvalidEndpoint(_)
                        | ProviderErrorKind::InvalidProvider,
                    ..
                })
        )
    }
}

/// Detailed provider-specific error.
#[derive(Debug, Error)]
#[error("[{provider}] {kind}")]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

/// Failure kinds within the provider layer.
#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    /// Client constructed with a config for a different provider.
    #[error("config does not match this provider")]
    InvalidProvider,

    /// Provider requires an API key but none was configured.
    #[error("missing API key")]
    MissingApiKey,

    /// Endpoint is empty or not http(s).
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Non-2xx HTTP status other than 429.
    #[error("http status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Upstream returned HTTP 429 after local admission.
    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Response decoded but carried no generated text.
    #[error("empty completion in response")]
    EmptyCompletion,
}

/// Truncated, single-line body snippet safe for logs.
pub fn make_snippet(body: &str) -> String {
    let flat = body.replace(['\n', '\r'], " ");
    let mut s: String = flat.chars().take(220).collect();
    if flat.chars().count() > 220 {
        s.push('…');
    }
    s
}

/// Error enum for environment/config-driven setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (limits, timeouts).
    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_PROVIDER`.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("{field} is out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: &'static str,
    },
}

/* ------------------------ Env helpers ------------------------ */

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`ConfigError::MissingVar`] if the variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<u32>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected u32",
                })
        }
        _ => Ok(None),
    }
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<u64>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected u64",
                })
        }
        _ => Ok(None),
    }
}

/// Parses an optional `f64` from env (`Ok(None)` if unset/empty).
pub fn env_opt_f64(name: &'static str) -> Result<Option<f64>, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<f64>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected f64",
                })
        }
        _ => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_flattened_and_bounded() {
        let s = make_snippet("line one\nline two\r\nline three");
        assert!(!s.contains('\n'));
        let long = "x".repeat(1000);
        assert!(make_snippet(&long).chars().count() <= 221);
    }

    #[test]
    fn endpoint_validation() {
        assert!(validate_http_endpoint("X", "https://api.example.com").is_ok());
        assert!(validate_http_endpoint("X", "ftp://api.example.com").is_err());
    }
}
