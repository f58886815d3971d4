//! Workflow configuration.

use std::time::Duration;

use domain::DEFAULT_PAYMENT_METHOD;

/// Backoff schedule for retrying a unit of work that lost a write race.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Runs every operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay to wait after `delay`, capped at `max_delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.multiplier).min(self.max_delay)
    }
}

/// Configuration shared by the inventory coordinator and the order orchestrator.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    pub retry: RetryConfig,
    /// Payment method recorded on orders that do not name one.
    pub default_payment_method: String,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            default_payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
        }
    }
}

impl FulfillmentConfig {
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_payment_method(mut self, method: impl Into<String>) -> Self {
        self.default_payment_method = method.into();
        self
    }
}
