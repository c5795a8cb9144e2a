//! Anthropic-compatible service for text generation.
//!
//! Non-streaming client around the messages REST surface:
//! - POST {endpoint}/v1/messages
//!
//! Auth uses the `x-api-key` header plus a pinned `anthropic-version`.

use std::time::{Duration, Instant};

use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{GatewayError, ProviderError, ProviderErrorKind, make_snippet},
    pricing::TokenUsage,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generation cap sent when the config does not set one; the messages API
/// requires `max_tokens` on every request.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Thin client for an Anthropic-compatible API.
#[derive(Debug)]
pub struct AnthropicService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_messages: String,
}

impl AnthropicService {
    /// Creates a new [`AnthropicService`] from the given config.
    ///
    /// Validates provider, API key, and endpoint scheme, mirroring the
    /// OpenAI client construction.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, GatewayError> {
        // 1) Provider must match.
        if cfg.provider != LlmProvider::Anthropic {
            return Err(ProviderError::new(
                LlmProvider::Anthropic,
                ProviderErrorKind::InvalidProvider,
            )
            .into());
        }

        // 2) API key must be present.
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            ProviderError::new(LlmProvider::Anthropic, ProviderErrorKind::MissingApiKey)
        })?;

        // 3) Endpoint must use http/https.
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ProviderError::new(
                LlmProvider::Anthropic,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        // 4) HTTP client: timeout + default headers.
        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(120));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&api_key).map_err(|e| {
                ProviderError::new(
                    LlmProvider::Anthropic,
                    ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
                )
            })?,
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let url_messages = format!("{}/v1/messages", endpoint.trim_end_matches('/'));

        info!(
            provider = %cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            "AnthropicService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_messages,
        })
    }

    /// Performs a non-streaming messages request.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<(String, TokenUsage), GatewayError> {
        let started = Instant::now();
        let body = MessagesRequest {
            model: &self.cfg.model,
            max_tokens: self.cfg.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: self.cfg.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(
            model = %self.cfg.model,
            prompt_len = prompt.len(),
            has_system = system.is_some(),
            "POST {}", self.url_messages
        );

        let resp = self
            .client
            .post(&self.url_messages)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let retry_after = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                url = %self.url_messages,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "messages request returned non-success status"
            );

            let kind = if status == StatusCode::TOO_MANY_REQUESTS {
                ProviderErrorKind::RateLimited {
                    retry_after_secs: retry_after,
                }
            } else {
                ProviderErrorKind::HttpStatus {
                    status,
                    url: self.url_messages.clone(),
                    snippet,
                }
            };
            return Err(ProviderError::new(LlmProvider::Anthropic, kind).into());
        }

        let out: MessagesResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                LlmProvider::Anthropic,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `content[0].text`")),
            )
        })?;

        let usage = TokenUsage {
            prompt_tokens: out.usage.input_tokens,
            completion_tokens: out.usage.output_tokens,
        };

        let text: String = out
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ProviderError::new(
                LlmProvider::Anthropic,
                ProviderErrorKind::EmptyCompletion,
            )
            .into());
        }

        info!(
            model = %self.cfg.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            latency_ms = started.elapsed().as_millis(),
            "messages request completed"
        );

        Ok((text, usage))
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}
