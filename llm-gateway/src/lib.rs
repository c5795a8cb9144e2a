//! Rate-limited LLM gateway.
//!
//! Single choke point for every LLM call the automation pipeline makes:
//! - token-bucket admission with a minimum gap between requests,
//! - enum-dispatched provider clients (OpenAI / Anthropic / Gemini),
//! - token usage and estimated cost accounting per call.
//!
//! Construct one [`LlmGateway`] at startup, wrap it in `Arc`, and pass
//! clones to dependents. No `async-trait` and no boxed futures are used;
//! providers are plain structs dispatched through an enum.

pub mod config;
pub mod error_handler;
pub mod gateway;
pub mod pricing;
pub mod rate_limiter;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::{GatewayError, ProviderError, ProviderErrorKind};
pub use gateway::{Completion, GenerateRequest, LlmGateway};
pub use pricing::TokenUsage;
pub use rate_limiter::RateLimiter;
