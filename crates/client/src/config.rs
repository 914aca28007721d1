//! Configuration types for the Odoo client.

use crate::error::{OdooError, OdooResult};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default Odoo company id.
pub const DEFAULT_COMPANY_ID: i64 = 1;

/// Connection settings for one named Odoo backend.
///
/// Profiles are built once at startup and never mutated afterwards. The API
/// key is kept as a [`SecretString`] so `Debug` output never reveals it.
#[derive(Debug, Clone)]
pub struct CompanyProfile {
    /// Unique company name (the configuration section).
    pub name: String,
    /// Base URL of the Odoo server.
    pub base_url: Url,
    /// Database selected through the `X-Odoo-Database` header.
    pub database: String,
    /// Bearer token.
    pub api_key: SecretString,
    /// Odoo company id.
    pub company_id: i64,
    /// Timeout applied to each attempt (connect + read).
    pub timeout: Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl CompanyProfile {
    /// Create a profile with default timeout, retries and company id.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        database: impl Into<String>,
        api_key: impl Into<String>,
    ) -> OdooResult<Self> {
        let name = name.into();
        let database = database.into();
        let api_key: String = api_key.into();

        let base_url = Url::parse(base_url.trim())?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(OdooError::Config(format!(
                "company '{}': unsupported URL scheme '{}'",
                name,
                base_url.scheme()
            )));
        }
        if base_url.cannot_be_a_base() {
            return Err(OdooError::Config(format!(
                "company '{}': '{}' cannot be used as a base URL",
                name, base_url
            )));
        }

        if database.trim().is_empty() {
            return Err(OdooError::Config(format!("company '{}': database is empty", name)));
        }
        HeaderValue::from_str(&database).map_err(|_| {
            OdooError::Config(format!("company '{}': invalid database name", name))
        })?;

        if api_key.trim().is_empty() {
            return Err(OdooError::Config(format!("company '{}': API key is empty", name)));
        }
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            OdooError::Config(format!("company '{}': invalid API key format", name))
        })?;

        Ok(Self {
            name,
            base_url,
            database,
            api_key: SecretString::from(api_key),
            company_id: DEFAULT_COMPANY_ID,
            timeout: DEFAULT_TIMEOUT,
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the Odoo company id.
    pub fn with_company_id(mut self, company_id: i64) -> Self {
        self.company_id = company_id;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry_config.max_retries = max_retries;
        self
    }

    /// Replace the retry configuration.
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Short, log-safe hint of the API key.
    pub fn api_key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        if key.chars().count() <= 8 {
            return "****".to_string();
        }
        let prefix: String = key.chars().take(4).collect();
        format!("{}…", prefix)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(120),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate the delay before retry number `attempt` (0 for the first retry).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        std::cmp::min(backoff, self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CompanyProfile {
        CompanyProfile::new(
            "acme",
            "https://acme.odoo.com",
            "acme-prod",
            "1b9d57b74136bd3645b971a04e2144fb",
        )
        .unwrap()
    }

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig::default();

        // 1s, 2s, 4s
        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let config = RetryConfig {
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        };

        assert_eq!(config.backoff_for_attempt(10), Duration::from_millis(500));
    }


    #[test]
    fn test_retry_config_no_retry() {
        let config = RetryConfig::no_retry();

        assert_eq!(config.max_retries, 0);
        assert_eq!(config.initial_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_profile_defaults() {
        let profile = profile();

        assert_eq!(profile.name, "acme");
        assert_eq!(profile.database, "acme-prod");
        assert_eq!(profile.company_id, 1);
        assert_eq!(profile.timeout, Duration::from_secs(30));
        assert_eq!(profile.retry_config.max_retries, 3);
    }

    #[test]
    fn test_profile_overrides() {
        let profile = profile()
            .with_company_id(2)
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0);

        assert_eq!(profile.company_id, 2);
        assert_eq!(profile.timeout, Duration::from_secs(5));
        assert_eq!(profile.retry_config.max_retries, 0);
    }

    #[test]
    fn test_profile_debug_hides_api_key() {
        let profile = profile();
        let debug = format!("{:?}", profile);

        assert!(!debug.contains("1b9d57b74136bd3645b971a04e2144fb"));
        assert_eq!(profile.api_key_hint(), "1b9d…");
    }

    #[test]
    fn test_short_api_key_hint_is_fully_masked() {
        let profile = CompanyProfile::new("acme", "http://localhost:8069", "db", "short").unwrap();
        assert_eq!(profile.api_key_hint(), "****");
    }

    #[test]
    fn test_profile_rejects_bad_input() {
        assert!(matches!(
            CompanyProfile::new("acme", "not a url", "db", "key"),
            Err(OdooError::InvalidUrl(_))
        ));
        assert!(matches!(
            CompanyProfile::new("acme", "ftp://example.com", "db", "key"),
            Err(OdooError::Config(_))
        ));
        assert!(matches!(
            CompanyProfile::new("acme", "http://localhost:8069", " ", "key"),
            Err(OdooError::Config(_))
        ));
        assert!(matches!(
            CompanyProfile::new("acme", "http://localhost:8069", "db", ""),
            Err(OdooError::Config(_))
        ));
        assert!(matches!(
            CompanyProfile::new("acme", "http://localhost:8069", "db", "bad\nkey"),
            Err(OdooError::Config(_))
        ));
    }
}
