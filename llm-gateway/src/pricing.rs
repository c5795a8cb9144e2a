//! Token usage accounting and per-model price table.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Token counts reported by a provider for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// USD per 1M prompt tokens / per 1M completion tokens.
///
/// Matched by prefix so dated model ids ("-20240620" and friends) hit the
/// same row as their alias.
const PRICES_PER_MTOK: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4.1-mini", 0.40, 1.60),
    ("gpt-4.1", 2.00, 8.00),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("claude-3-7-sonnet", 3.00, 15.00),
    ("gemini-1.5-flash", 0.075, 0.30),
    ("gemini-1.5-pro", 1.25, 5.00),
    ("gemini-2.0-flash", 0.10, 0.40),
];

/// Estimated USD cost for one completion.
///
/// Unknown models cost `0.0` and emit a warning rather than failing the
/// task that produced the completion.
pub fn estimate_cost_usd(model: &str, usage: &TokenUsage) -> f64 {
    match PRICES_PER_MTOK.iter().find(|(p, _, _)| model.starts_with(p)) {
        Some((_, input, output)) => {
            (usage.prompt_tokens as f64 * input + usage.completion_tokens as f64 * output) / 1e6
        }
        None => {
            warn!(model = %model, "no price table entry; reporting zero cost");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_picks_the_dated_variant_row() {
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
        };
        let cost = estimate_cost_usd("claude-3-5-sonnet-20240620", &usage);
        assert!((cost - 18.0).abs() < 1e-9);
    }

    #[test]
    fn longer_prefixes_win_over_shorter_family_names() {
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 0,
        };
        // "gpt-4o-mini" must not be priced as "gpt-4o".
        let cost = estimate_cost_usd("gpt-4o-mini-2024-07-18", &usage);
        assert!((cost - 0.15).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_costs_zero() {
        let usage = TokenUsage {
            prompt_tokens: 500,
            completion_tokens: 500,
        };
        assert_eq!(estimate_cost_usd("some-local-model", &usage), 0.0);
    }
}
