//! The gateway facade: admission control + enum-dispatched provider call.
//!
//! Construct once, wrap in `Arc`, and pass clones to dependents. Every LLM
//! call in the process flows through [`LlmGateway::generate`], which is the
//! only place the rate limiter is consulted.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::{
    config::{default_config::config_from_env, llm_model_config::LlmModelConfig,
             llm_provider::LlmProvider},
    error_handler::GatewayError,
    pricing::{TokenUsage, estimate_cost_usd},
    rate_limiter::RateLimiter,
    services::{
        anthropic_service::AnthropicService, gemini_service::GeminiService,
        open_ai_service::OpenAiService,
    },
};

/// One generation request.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
}

/// One completed generation with usage accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub estimated_cost_usd: f64,
}

/// Concrete provider client (enum-dispatch).
#[derive(Debug)]
enum ProviderService {
    OpenAi(OpenAiService),
    Anthropic(AnthropicService),
    Gemini(GeminiService),
}

/// Process-wide rate-limited LLM access point.
#[derive(Debug)]
pub struct LlmGateway {
    model: String,
    provider: LlmProvider,
    service: ProviderService,
    limiter: RateLimiter,
    total_requests: AtomicU64,
    total_prompt_tokens: AtomicU64,
    total_completion_tokens: AtomicU64,
}

/// Cumulative counters since process start.
#[derive(Debug, Clone, Copy)]
pub struct GatewayTotals {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl LlmGateway {
    /// Builds the gateway from a complete config.
    ///
    /// # Errors
    /// Propagates provider-construction failures (bad key/endpoint/provider).
    pub fn new(cfg: LlmModelConfig) -> Result<Self, GatewayError> {
        let limiter = RateLimiter::new(cfg.max_requests_per_minute, cfg.min_delay_seconds);
        let model = cfg.model.clone();
        let provider = cfg.provider;
        let service = match cfg.provider {
            LlmProvider::OpenAi => ProviderService::OpenAi(OpenAiService::new(cfg)?),
            LlmProvider::Anthropic => ProviderService::Anthropic(AnthropicService::new(cfg)?),
            LlmProvider::Gemini => ProviderService::Gemini(GeminiService::new(cfg)?),
        };
        Ok(Self {
            model,
            provider,
            service,
            limiter,
            total_requests: AtomicU64::new(0),
            total_prompt_tokens: AtomicU64::new(0),
            total_completion_tokens: AtomicU64::new(0),
        })
    }

    /// Builds the gateway from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(config_from_env()?)
    }

    /// Configured model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Configured provider.
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Generates text for the request after acquiring an admission token.
    ///
    /// The local admission step waits; a `rate_limited` outcome can only
    /// originate from the downstream provider itself (HTTP 429).
    ///
    /// # Errors
    /// Propagates [`GatewayError`] from the provider layer.
    pub async fn generate(&self, req: GenerateRequest<'_>) -> Result<Completion, GatewayError> {
        self.limiter.acquire().await;
        debug!(model = %self.model, prompt_len = req.prompt.len(), "admitted LLM request");

        let (text, usage) = match &self.service {
            ProviderService::OpenAi(s) => s.generate(req.prompt, req.system).await?,
            ProviderService::Anthropic(s) => s.generate(req.prompt, req.system).await?,
            ProviderService::Gemini(s) => s.generate(req.prompt, req.system).await?,
        };

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.total_completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);

        Ok(Completion {
            estimated_cost_usd: estimate_cost_usd(&self.model, &usage),
            text,
            usage,
        })
    }

    /// Cumulative usage counters since process start.
    pub fn totals(&self) -> GatewayTotals {
        GatewayTotals {
            requests: self.total_requests.load(Ordering::Relaxed),
            prompt_tokens: self.total_prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.total_completion_tokens.load(Ordering::Relaxed),
        }
    }
}
