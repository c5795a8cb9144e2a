//! Bounded exponential backoff with jitter for host calls.

use std::time::Duration;

/// Retry tuning for host requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor in `0.0..=1.0`; the delay is scaled by a pseudo-random
    /// value in `[1 - jitter/2, 1 + jitter/2]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (0-based). An explicit
    /// server-provided hint (Retry-After) overrides the computed backoff.
    pub fn delay_for(&self, attempt: u32, server_hint_secs: Option<u64>) -> Duration {
        if let Some(secs) = server_hint_secs {
            return Duration::from_secs(secs).min(self.max_delay);
        }
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let scale = 1.0 - self.jitter / 2.0 + self.jitter * pseudo_unit(attempt);
        exp.mul_f64(scale).min(self.max_delay)
    }
}

/// Deterministic pseudo-random value in `[0, 1)` mixed from the attempt
/// number and the clock. Enough to de-synchronize retry herds without an
/// RNG dependency.
fn pseudo_unit(attempt: u32) -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let mixed = (u64::from(nanos) ^ (u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15)))
        .wrapping_mul(0xBF58_476D_1CE4_E5B9);
    (mixed >> 40) as f64 / (1u64 << 24) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(p.delay_for(0, None), Duration::from_millis(500));
        assert_eq!(p.delay_for(1, None), Duration::from_millis(1000));
        assert_eq!(p.delay_for(2, None), Duration::from_millis(2000));
        assert_eq!(p.delay_for(10, None), Duration::from_secs(10));
    }

    #[test]
    fn server_hint_wins_but_is_capped() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0, Some(3)), Duration::from_secs(3));
        assert_eq!(p.delay_for(0, Some(600)), p.max_delay);
    }

    #[test]
    fn jitter_stays_inside_bounds() {
        let p = RetryPolicy::default();
        for attempt in 0..8 {
            let d = p.delay_for(attempt, None);
            assert!(d <= p.max_delay);
            assert!(d >= p.base_delay.mul_f64(1.0 - p.jitter / 2.0));
        }
    }
}
