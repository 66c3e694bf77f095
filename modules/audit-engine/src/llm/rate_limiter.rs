//! Rolling-window rate limiting and exponential backoff for the LLM client.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

const WINDOW: Duration = Duration::from_secs(60);
const BASE_BACKOFF_SECS: u64 = 5;
const MAX_BACKOFF_SECS: u64 = 120;

/// Token-bucket-style limiter over a rolling 60-second window, plus
/// exponential backoff (`5s * 2^(k-1)`, capped at 120s) after failures.
pub struct RateLimiter {
    requests_per_minute: u32,
    state: Mutex<State>,
}

struct State {
    request_times: VecDeque<Instant>,
    backoff_until: Option<Instant>,
    consecutive_failures: u32,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            state: Mutex::new(State {
                request_times: VecDeque::new(),
                backoff_until: None,
                consecutive_failures: 0,
            }),
        }
    }

    /// Blocks until a request is safe to send: first honors any active
    /// backoff window, then drops request timestamps older than the
    /// rolling window and waits if the per-minute quota is exhausted.
    pub async fn wait_if_needed(&self) {
        let mut state = self.state.lock().await;

        if let Some(until) = state.backoff_until {
            let now = Instant::now();
            if now < until {
                let wait = until - now;
                warn!(wait_secs = wait.as_secs_f64(), "in backoff period");
                tokio::time::sleep(wait).await;
            }
        }

        let now = Instant::now();
        while let Some(&front) = state.request_times.front() {
            if now.duration_since(front) >= WINDOW {
                state.request_times.pop_front();
            } else {
                break;
            }
        }

        if state.request_times.len() as u32 >= self.requests_per_minute {
            let oldest = *state.request_times.front().expect("len checked above");
            let wait = WINDOW.saturating_sub(now.duration_since(oldest)) + Duration::from_secs(1);
            info!(wait_secs = wait.as_secs_f64(), "rate limit reached");
            tokio::time::sleep(wait).await;
        }

        state.request_times.push_back(Instant::now());
    }

    /// Records a failure and returns the backoff duration now in effect.
    pub async fn record_failure(&self) -> Duration {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;
        let backoff_secs = BASE_BACKOFF_SECS
            .saturating_mul(1u64 << (state.consecutive_failures - 1).min(63))
            .min(MAX_BACKOFF_SECS);
        let backoff = Duration::from_secs(backoff_secs);
        state.backoff_until = Some(Instant::now() + backoff);
        warn!(failure = state.consecutive_failures, backoff_secs, "recording LLM failure");
        backoff
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backoff_doubles_and_caps_at_120s() {
        let limiter = RateLimiter::new(100);
        assert_eq!(limiter.record_failure().await, Duration::from_secs(5));
        assert_eq!(limiter.record_failure().await, Duration::from_secs(10));
        assert_eq!(limiter.record_failure().await, Duration::from_secs(20));
        assert_eq!(limiter.record_failure().await, Duration::from_secs(40));
        assert_eq!(limiter.record_failure().await, Duration::from_secs(80));
        assert_eq!(limiter.record_failure().await, Duration::from_secs(120));
        assert_eq!(limiter.record_failure().await, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let limiter = RateLimiter::new(100);
        limiter.record_failure().await;
        limiter.record_failure().await;
        limiter.record_success().await;
        assert_eq!(limiter.record_failure().await, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn wait_if_needed_does_not_block_under_quota() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait_if_needed().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
