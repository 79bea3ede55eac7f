use std::time::Duration;

use chrono::{DateTime, Utc};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub current_retry: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub backoff_multiplier: f64,
    pub preferred_provider: Option<String>,
    pub fallback_enabled: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_multiplier: f64, preferred_provider: Option<String>) -> Self {
        Self {
            max_retries,
            current_retry: 0,
            next_retry_at: None,
            backoff_multiplier,
            preferred_provider,
            fallback_enabled: true,
        }
    }

    /// Policy for one-off invocations: a single attempt, never rescheduled.
    pub fn single_shot(provider: impl Into<String>) -> Self {
        Self {
            max_retries: 0,
            current_retry: 0,
            next_retry_at: None,
            backoff_multiplier: 1.0,
            preferred_provider: Some(provider.into()),
            fallback_enabled: false,
        }
    }

    pub fn has_budget(&self) -> bool {
        self.current_retry < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF_MULTIPLIER, None)
    }
}

/// Delay schedule between retries: `base * multiplier^retry`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    pub fn delay_for(&self, retry: u32, multiplier: f64) -> Duration {
        // A multiplier below 1 would shrink the delay between consecutive failures.
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let seconds = self.base_delay.as_secs_f64() * multiplier.powi(exponent);
        let cap = self.max_delay.as_secs_f64();

        if !seconds.is_finite() || seconds >= cap {
            self.max_delay
        } else {
            Duration::from_secs_f64(seconds)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}
