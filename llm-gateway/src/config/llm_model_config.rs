use crate::config::llm_provider::LlmProvider;

/// Configuration for LLM invocations through the gateway.
///
/// Contains both general knobs and the admission-control tuning of the
/// rate limiter that guards the provider.
#[derive(Debug, Clone)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"gpt-4o-mini"`).
    pub model: String,

    /// Inference endpoint base URL.
    pub endpoint: String,

    /// API key for the provider.
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,

    /// Token-bucket capacity: maximum admissions per rolling minute.
    pub max_requests_per_minute: u32,

    /// Minimum gap between two successive admissions, in seconds.
    pub min_delay_seconds: f64,
}
