//! Checkout configuration.
//!
//! Values come from `FESTIVAL_*` environment variables. Unset variables fall
//! back to defaults; set but unparseable ones are an error, so a typo in a
//! deployment never silently runs with defaults.

use crate::error::ConfigError;
use festival_runtime::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Backend base URL
pub const ENV_API_BASE_URL: &str = "FESTIVAL_API_BASE_URL";
/// Per-call timeout in milliseconds
pub const ENV_HTTP_TIMEOUT_MS: &str = "FESTIVAL_HTTP_TIMEOUT_MS";
/// Total attempts for registration, order creation and uploads
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "FESTIVAL_RETRY_MAX_ATTEMPTS";
/// Delay before the first retry in milliseconds
pub const ENV_RETRY_INITIAL_DELAY_MS: &str = "FESTIVAL_RETRY_INITIAL_DELAY_MS";
/// Promo revalidation debounce in milliseconds
pub const ENV_PROMO_DEBOUNCE_MS: &str = "FESTIVAL_PROMO_DEBOUNCE_MS";
/// Draft autosave debounce in milliseconds
pub const ENV_DRAFT_DEBOUNCE_MS: &str = "FESTIVAL_DRAFT_DEBOUNCE_MS";
/// Draft file location
pub const ENV_DRAFT_PATH: &str = "FESTIVAL_DRAFT_PATH";
/// Pre-hosted payment form shown when payment initialisation keeps failing
pub const ENV_FALLBACK_PAYMENT_URL: &str = "FESTIVAL_FALLBACK_PAYMENT_URL";

/// Runtime settings of the checkout
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutConfig {
    /// Backend base URL
    pub api_base_url: String,
    /// Bound on every backend call
    pub http_timeout: Duration,
    /// Retry policy for the payment critical path and uploads
    pub retry: RetryPolicy,
    /// Quiet period before an automatic promo revalidation
    pub promo_debounce: Duration,
    /// Quiet period before the draft is written
    pub draft_debounce: Duration,
    /// Where [`FileDraftStore`](crate::draft::FileDraftStore) keeps the draft
    pub draft_path: PathBuf,
    /// Alternate payment form link
    pub fallback_payment_url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            http_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            promo_debounce: crate::promo::PROMO_DEBOUNCE,
            draft_debounce: crate::draft::DRAFT_DEBOUNCE,
            draft_path: PathBuf::from("festival-checkout-draft.json"),
            fallback_payment_url: "https://forms.gle/festival-registration".to_string(),
        }
    }
}

impl CheckoutConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a numeric variable does not
    /// parse or a duration is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Same as [`CheckoutConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
                    _ => Err(ConfigError::InvalidEnv { name, value: raw }),
                },
            }
        };

        let max_attempts = match lookup(ENV_RETRY_MAX_ATTEMPTS) {
            None => defaults.retry.max_attempts,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_RETRY_MAX_ATTEMPTS,
                        value: raw,
                    });
                },
            },
        };

        let retry = RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_delay(millis(ENV_RETRY_INITIAL_DELAY_MS, defaults.retry.initial_delay)?)
            .build();

        Ok(Self {
            api_base_url: lookup(ENV_API_BASE_URL).unwrap_or(defaults.api_base_url),
            http_timeout: millis(ENV_HTTP_TIMEOUT_MS, defaults.http_timeout)?,
            retry,
            promo_debounce: millis(ENV_PROMO_DEBOUNCE_MS, defaults.promo_debounce)?,
            draft_debounce: millis(ENV_DRAFT_DEBOUNCE_MS, defaults.draft_debounce)?,
            draft_path: lookup(ENV_DRAFT_PATH).map_or(defaults.draft_path, PathBuf::from),
            fallback_payment_url: lookup(ENV_FALLBACK_PAYMENT_URL)
                .unwrap_or(defaults.fallback_payment_url),
        })
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the fallback payment link.
    #[must_use]
    pub fn with_fallback_payment_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_payment_url = url.into();
        self
    }
}
