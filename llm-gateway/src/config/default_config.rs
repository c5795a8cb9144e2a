//! Gateway config loaded from environment variables.
//!
//! # Environment variables
//!
//! - `LLM_PROVIDER` = provider kind (`openai`, `anthropic`, `gemini`) - required
//! - `LLM_MODEL`    = model id (defaults to the provider's default model)
//! - `LLM_API_KEY`  = API key (required for all hosted providers)
//! - `LLM_ENDPOINT` = endpoint base URL (defaults per provider)
//! - `LLM_MAX_TOKENS` = optional generation cap (u32)
//! - `LLM_MAX_RPM`  = token-bucket capacity per minute (default 10)
//! - `LLM_MIN_DELAY_SECONDS` = minimum gap between admissions (default 2.0)
//! - `LLM_TIMEOUT_SECONDS` = per-request timeout (default 120)

use std::str::FromStr;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        ConfigError, GatewayError, env_opt_f64, env_opt_u32, env_opt_u64, must_env,
        validate_http_endpoint,
    },
};

/// Builds the gateway model config strictly from environment variables.
///
/// # Errors
/// - [`ConfigError::MissingVar`] when `LLM_PROVIDER` or `LLM_API_KEY` is absent
/// - [`ConfigError::UnsupportedProvider`] for an unknown `LLM_PROVIDER`
/// - [`ConfigError::InvalidNumber`] for malformed numeric variables
/// - [`ConfigError::InvalidFormat`] for a non-HTTP endpoint
pub fn config_from_env() -> Result<LlmModelConfig, GatewayError> {
    let provider = LlmProvider::from_str(&must_env("LLM_PROVIDER")?)?;
    let api_key = must_env("LLM_API_KEY")?;

    let model = std::env::var("LLM_MODEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| provider.default_model().to_string());

    let endpoint = std::env::var("LLM_ENDPOINT")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| provider.default_endpoint().to_string());
    validate_http_endpoint("LLM_ENDPOINT", &endpoint)?;

    let max_rpm = env_opt_u32("LLM_MAX_RPM")?.unwrap_or(10);
    if max_rpm == 0 {
        return Err(ConfigError::OutOfRange {
            field: "LLM_MAX_RPM",
            detail: "expected at least 1",
        }
        .into());
    }
    let min_delay = env_opt_f64("LLM_MIN_DELAY_SECONDS")?.unwrap_or(2.0);
    if !(min_delay.is_finite() && min_delay >= 0.0) {
        return Err(ConfigError::OutOfRange {
            field: "LLM_MIN_DELAY_SECONDS",
            detail: "expected a finite value >= 0",
        }
        .into());
    }

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.2),
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECONDS")?.unwrap_or(120)),
        max_requests_per_minute: max_rpm,
        min_delay_seconds: min_delay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test to avoid
    // interleaving with other env readers.
    #[test]
    fn builds_config_with_provider_defaults() {
        unsafe {
            std::env::set_var("LLM_PROVIDER", "anthropic");
            std::env::set_var("LLM_API_KEY", "test-key");
            std::env::remove_var("LLM_MODEL");
            std::env::remove_var("LLM_ENDPOINT");
            std::env::remove_var("LLM_MAX_RPM");
        }

        let cfg = config_from_env().unwrap();
        assert_eq!(cfg.provider, LlmProvider::Anthropic);
        assert_eq!(cfg.model, "claude-3-5-sonnet-latest");
        assert_eq!(cfg.endpoint, "https://api.anthropic.com");
        assert_eq!(cfg.max_requests_per_minute, 10);
        assert!((cfg.min_delay_seconds - 2.0).abs() < f64::EPSILON);
    }
}
