//! Orchestrator configuration loaded from environment variables.

use std::time::Duration;

use crate::checkout_flow;
use crate::retry::RetryPolicy;

/// Checkout tuning with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_CALL_TIMEOUT_MS`: limit for any single remote call (default: `2000`)
/// - `CHECKOUT_DEADLINE_MS`: overall deadline per run, `0` disables it (default: `10000`)
/// - `CHECKOUT_MARK_PAID_ATTEMPTS`: attempts to mark an order paid (default: `3`)
/// - `CHECKOUT_MARK_PAID_BACKOFF_MS`: first retry delay (default: `50`)
/// - `CHECKOUT_CHARGE_ATTEMPTS`: attempts to charge on transient errors (default: `3`)
/// - `CHECKOUT_CHARGE_BACKOFF_MS`: first charge retry delay (default: `50`)
/// - `CHECKOUT_CART_CLEAR_GRACE_MS`: wait for the cart clear before detaching it (default: `50`)
/// - `CHECKOUT_NOTIFICATION_TOPIC`: confirmation topic (default: `"email"`)
/// - `CHECKOUT_NOTIFICATION_SENDER`: confirmation sender (default: `"from@example.com"`)
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub call_timeout: Duration,
    pub deadline: Option<Duration>,
    pub mark_paid_retry: RetryPolicy,
    /// Applied to transient charge errors. The charge is idempotent per order.
    pub charge_retry: RetryPolicy,
    /// After this the cart-clear lane is detached rather than awaited.
    pub cart_clear_grace: Duration,
    pub notification_topic: String,
    pub notification_sender: String,
    pub currency: String,
}

impl CheckoutConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let deadline_ms = env_u64("CHECKOUT_DEADLINE_MS").unwrap_or(10_000);
        let mark_paid_retry = env_retry(
            "CHECKOUT_MARK_PAID_ATTEMPTS",
            "CHECKOUT_MARK_PAID_BACKOFF_MS",
            &defaults.mark_paid_retry,
        );
        let charge_retry = env_retry(
            "CHECKOUT_CHARGE_ATTEMPTS",
            "CHECKOUT_CHARGE_BACKOFF_MS",
            &defaults.charge_retry,
        );

        Self {
            call_timeout: env_u64("CHECKOUT_CALL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            deadline: (deadline_ms > 0).then(|| Duration::from_millis(deadline_ms)),
            mark_paid_retry,
            charge_retry,
            cart_clear_grace: env_u64("CHECKOUT_CART_CLEAR_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cart_clear_grace),
            notification_topic: std::env::var("CHECKOUT_NOTIFICATION_TOPIC")
                .unwrap_or(defaults.notification_topic),
            notification_sender: std::env::var("CHECKOUT_NOTIFICATION_SENDER")
                .unwrap_or(defaults.notification_sender),
            currency: defaults.currency,
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(2),
            deadline: Some(Duration::from_secs(10)),
            mark_paid_retry: RetryPolicy::default(),
            charge_retry: RetryPolicy::default(),
            cart_clear_grace: Duration::from_millis(50),
            notification_topic: checkout_flow::DEFAULT_NOTIFICATION_TOPIC.to_string(),
            notification_sender: checkout_flow::DEFAULT_NOTIFICATION_SENDER.to_string(),
            currency: checkout_flow::CURRENCY.to_string(),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_retry(attempts_key: &str, backoff_key: &str, default: &RetryPolicy) -> RetryPolicy {
    let attempts = env_u64(attempts_key)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(default.max_attempts);
    let backoff = env_u64(backoff_key)
        .map(Duration::from_millis)
        .unwrap_or(default.initial_backoff);
    RetryPolicy::new(attempts, backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CheckoutConfig::default();
        assert_eq!(config.call_timeout, Duration::from_secs(2));
        assert_eq!(config.deadline, Some(Duration::from_secs(10)));
        assert_eq!(config.mark_paid_retry.max_attempts, 3);
        assert_eq!(config.charge_retry.max_attempts, 3);
        assert_eq!(config.cart_clear_grace, Duration::from_millis(50));
        assert_eq!(config.notification_topic, "email");
        assert_eq!(config.notification_sender, "from@example.com");
        assert_eq!(config.currency, "USD");
    }
}
