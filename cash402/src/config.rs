//! Client configuration.
//!
//! Can be built in code, deserialized from any serde format, or read from
//! the process environment.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "payment_timeout_ms": 30000,
//!   "retry_delay_ms": 500,
//!   "max_amount": 10000,
//!   "session_reuse": true
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `X402_PAYMENT_TIMEOUT_MS` - Bound on one payment rail call
//! - `X402_RETRY_DELAY_MS` - Pause between payment and retry
//! - `X402_MAX_AMOUNT` - Largest challenge amount paid automatically
//! - `X402_SESSION_REUSE` - `true`/`false`, present cached session tokens

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

/// Default pause before retrying, giving a 0-conf transaction time to reach
/// the server's mempool view.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Configuration for the payment engine.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bound on a single payment rail call. When unset, the timeout of the
    /// request being paid for is used; when that is unset too, the call is
    /// unbounded.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "payment_timeout_ms")]
    pub payment_timeout: Option<Duration>,

    /// Pause between a successful payment and the retry (default: 500 ms).
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_retry_delay", rename = "retry_delay_ms")]
    pub retry_delay: Duration,

    /// Largest amount paid without asking. Unset means no cap.
    #[serde(default)]
    pub max_amount: Option<u64>,

    /// Whether cached session tokens are presented on outgoing requests.
    #[serde(default = "default_session_reuse")]
    pub session_reuse: bool,
}

const fn default_retry_delay() -> Duration {
    DEFAULT_RETRY_DELAY
}

const fn default_session_reuse() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            payment_timeout: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_amount: None,
            session_reuse: true,
        }
    }
}

/// An environment variable held a value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    /// Variable name.
    pub var: &'static str,
    /// Offending value.
    pub value: String,
}

impl ClientConfig {
    /// Reads configuration from `X402_*` environment variables, using defaults
    /// for any that are unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(
            var: &'static str,
            lookup: &impl Fn(&str) -> Option<String>,
        ) -> Result<Option<T>, ConfigError> {
            lookup(var)
                .map(|value| {
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError { var, value })
                })
                .transpose()
        }

        let mut config = Self::default();
        if let Some(ms) = parse::<u64>("X402_PAYMENT_TIMEOUT_MS", &lookup)? {
            config.payment_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse::<u64>("X402_RETRY_DELAY_MS", &lookup)? {
            config.retry_delay = Duration::from_millis(ms);
        }
        config.max_amount = parse("X402_MAX_AMOUNT", &lookup)?;
        if let Some(reuse) = parse("X402_SESSION_REUSE", &lookup)? {
            config.session_reuse = reuse;
        }
        Ok(config)
    }

    /// Sets the payment rail timeout.
    #[must_use]
    pub const fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = Some(timeout);
        self
    }

    /// Sets the pause between payment and retry.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Caps the amount paid per challenge.
    #[must_use]
    pub const fn with_max_amount(mut self, max_amount: u64) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    /// Enables or disables presenting cached session tokens.
    #[must_use]
    pub const fn with_session_reuse(mut self, enabled: bool) -> Self {
        self.session_reuse = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert!(config.session_reuse);
        assert!(config.payment_timeout.is_none());
        assert!(config.max_amount.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"payment_timeout_ms": 2500, "max_amount": 1000}"#).unwrap();
        assert_eq!(config.payment_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.max_amount, Some(1000));
        assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
        assert!(config.session_reuse);
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("X402_RETRY_DELAY_MS", "0"),
            ("X402_MAX_AMOUNT", "546"),
            ("X402_SESSION_REUSE", "false"),
        ]))
        .unwrap();
        assert_eq!(config.retry_delay, Duration::ZERO);
        assert_eq!(config.max_amount, Some(546));
        assert!(!config.session_reuse);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ClientConfig::from_lookup(lookup(&[("X402_PAYMENT_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(err.var, "X402_PAYMENT_TIMEOUT_MS");
        assert_eq!(err.value, "soon");
    }
}
