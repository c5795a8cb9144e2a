//! Token-bucket admission control for LLM calls.
//!
//! - Capacity equals the configured requests-per-minute; the bucket refills
//!   linearly at `capacity / 60` tokens per second.
//! - A minimum gap between successive admissions is enforced on top of the
//!   bucket, so bursts drain smoothly even with a full bucket.
//! - `acquire()` never fails and never reports "rate limited": it waits
//!   cooperatively until a token is available. Waiters are served FIFO.
//! - Dropping a waiting `acquire()` future releases the waiter's place in
//!   line without consuming a token.
//!
//! Uses `tokio::time` exclusively so tests can drive the clock.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::trace;

/// Process-wide admission gate. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    /// Fair turn-taking: tokio's mutex queues waiters FIFO, which gives
    /// the fairness guarantee among concurrent `acquire()` calls.
    turn: tokio::sync::Mutex<()>,
    state: Mutex<BucketState>,
    min_gap: Duration,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_grant: Option<Instant>,
}

impl RateLimiter {
    /// Creates a limiter with the given per-minute capacity and minimum
    /// inter-admission gap in seconds.
    ///
    /// `max_requests_per_minute` below 1 is clamped to 1.
    pub fn new(max_requests_per_minute: u32, min_delay_seconds: f64) -> Self {
        let capacity = f64::from(max_requests_per_minute.max(1));
        Self {
            turn: tokio::sync::Mutex::new(()),
            state: Mutex::new(BucketState {
                tokens: capacity,
                capacity,
                refill_per_sec: capacity / 60.0,
                last_refill: Instant::now(),
                last_grant: None,
            }),
            min_gap: Duration::from_secs_f64(min_delay_seconds.max(0.0)),
        }
    }

    /// Waits until one admission token is available, then consumes it.
    ///
    /// Cooperative: suspends on the internal queue and on the refill clock.
    /// Cancellation-safe: a dropped waiter consumes nothing.
    pub async fn acquire(&self) {
        let _turn = self.turn.lock().await;
        loop {
            let wait = {
                let mut st = self.state.lock().expect("limiter state poisoned");
                let now = Instant::now();

                // Linear refill since the last observation.
                let elapsed = now.duration_since(st.last_refill).as_secs_f64();
                st.tokens = (st.tokens + elapsed * st.refill_per_sec).min(st.capacity);
                st.last_refill = now;

                let token_wait = if st.tokens >= 1.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64((1.0 - st.tokens) / st.refill_per_sec)
                };
                let gap_wait = match st.last_grant {
                    Some(prev) => self.min_gap.saturating_sub(now.duration_since(prev)),
                    None => Duration::ZERO,
                };

                let wait = token_wait.max(gap_wait);
                if wait.is_zero() {
                    st.tokens -= 1.0;
                    st.last_grant = Some(now);
                    return;
                }
                wait
            };

            trace!(wait_ms = wait.as_millis() as u64, "limiter waiting");
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn enforces_minimum_gap_between_admissions() {
        let limiter = RateLimiter::new(60, 2.0);

        let t0 = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(2));

        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn starved_bucket_waits_for_linear_refill() {
        // Capacity 2, no extra gap: the third admission must wait for one
        // token to refill at 2/60 per second, i.e. 30 seconds.
        let limiter = RateLimiter::new(2, 0.0);

        let t0 = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(t0.elapsed() < Duration::from_secs(1));

        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_all_eventually_admitted() {
        let limiter = Arc::new(RateLimiter::new(2, 0.0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let l = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                l.acquire().await;
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for h in handles {
            times.push(h.await.unwrap());
        }
        times.sort();

        // No more than the bucket capacity inside any rolling minute.
        let inside_first_minute = times
            .iter()
            .filter(|t| t.duration_since(times[0]) < Duration::from_secs(30))
            .count();
        assert!(inside_first_minute <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_consume_a_token() {
        let limiter = Arc::new(RateLimiter::new(1, 0.0));
        limiter.acquire().await;

        // This waiter would block for ~60s; drop it early.
        let l = Arc::clone(&limiter);
        let waiter = tokio::spawn(async move { l.acquire().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        waiter.abort();

        // The next acquire still gets the refilled token on schedule.
        let t0 = Instant::now();
        limiter.acquire().await;
        assert!(t0.elapsed() <= Duration::from_secs(61));
    }
}
