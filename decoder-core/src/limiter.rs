//! Token budget per fixed time window.
//!
//! A local approximation of the generation API's remote quota. Token counts
//! reported in responses are ground truth for consumption; the window timing
//! is guessed locally, and a throttling response from the API overrides it
//! through [`TokenBudgetLimiter::force_exhaust_and_backoff`].
//!
//! All operations go through one async mutex. The lock is held across the
//! wait-then-reset in [`TokenBudgetLimiter::consult_and_wait_if_needed`], so
//! concurrent callers queue behind a reset instead of interleaving with it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Tokens granted per window.
    pub tokens_per_window: i64,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Fixed backoff applied after a throttling response, in seconds.
    pub throttle_backoff_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            tokens_per_window: 80_000,
            window_secs: 60,
            throttle_backoff_secs: 60,
        }
    }
}

impl LimiterConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn throttle_backoff(&self) -> Duration {
        Duration::from_secs(self.throttle_backoff_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub remaining: i64,
    pub window_reset_at: Instant,
}

#[derive(Debug)]
struct BudgetState {
    remaining: i64,
    window_reset_at: Instant,
}

#[derive(Debug)]
pub struct TokenBudgetLimiter {
    max_tokens: i64,
    window: Duration,
    state: Mutex<BudgetState>,
}

impl TokenBudgetLimiter {
    /// Starts with a full allowance and a window ending `window` from now.
    pub fn new(max_tokens: i64, window: Duration) -> Self {
        Self {
            max_tokens,
            window,
            state: Mutex::new(BudgetState {
                remaining: max_tokens,
                window_reset_at: Instant::now() + window,
            }),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.tokens_per_window, config.window())
    }

    pub fn max_tokens(&self) -> i64 {
        self.max_tokens
    }

    /// Returns immediately while budget remains inside the current window.
    /// Otherwise sleeps until the window end, then starts a fresh window with
    /// the full allowance.
    pub async fn consult_and_wait_if_needed(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if state.remaining > 0 && now < state.window_reset_at {
            debug!(remaining = state.remaining, "Token budget available");
            return;
        }

        let wait = state.window_reset_at.saturating_duration_since(now);
        if !wait.is_zero() {
            info!(
                wait_ms = wait.as_millis() as u64,
                remaining = state.remaining,
                "Token budget exhausted, waiting for window reset"
            );
            sleep(wait).await;
        }

        state.remaining = self.max_tokens;
        state.window_reset_at = Instant::now() + self.window;
        debug!(remaining = state.remaining, "Token budget window reset");
    }

    /// Subtract actually spent tokens. The allowance may go negative.
    pub async fn record_usage(&self, spent: u64) {
        let mut state = self.state.lock().await;
        let spent_signed = i64::try_from(spent).unwrap_or(i64::MAX);
        state.remaining = state.remaining.saturating_sub(spent_signed);
        debug!(spent, remaining = state.remaining, "Recorded token usage");
    }

    /// The API throttled us: treat the budget as zero and restart the window
    /// `backoff` from now.
    pub async fn force_exhaust_and_backoff(&self, backoff: Duration) {
        let mut state = self.state.lock().await;
        state.remaining = 0;
        state.window_reset_at = Instant::now() + backoff;
        info!(backoff_ms = backoff.as_millis() as u64, "Token budget forced to zero after throttling");
    }

    pub async fn snapshot(&self) -> BudgetSnapshot {
        let state = self.state.lock().await;
        BudgetSnapshot {
            remaining: state.remaining,
            window_reset_at: state.window_reset_at,
        }
    }
}
