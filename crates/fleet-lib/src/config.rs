//! Engine configuration
//!
//! Loaded from an optional TOML file and `FLEET__*` environment variables,
//! e.g. `FLEET__CATALOG__ENDPOINT=http://pricing:8080`.

use crate::catalog::CatalogResolver;
use crate::error::EngineError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub inventory: InventorySettings,
    #[serde(default)]
    pub explainer: ExplainerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Pricing catalog base URL; without one only static tables are used
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Candidate list size, clamped to 10..=20
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Trailing window for disruption history
    #[serde(default = "default_disruption_window_hours")]
    pub disruption_window_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerSettings {
    #[serde(default = "default_explainer_timeout")]
    pub timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_candidates() -> usize {
    CatalogResolver::DEFAULT_CANDIDATES
}

fn default_cache_ttl_hours() -> i64 {
    24
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_disruption_window_hours() -> i64 {
    168
}

fn default_explainer_timeout() -> u64 {
    20
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: default_request_timeout(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            cache_ttl_hours: default_cache_ttl_hours(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_request_timeout(),
            disruption_window_hours: default_disruption_window_hours(),
        }
    }
}

impl Default for ExplainerSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_explainer_timeout(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("FLEET")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let loaded: EngineConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Config("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(EngineError::Config("retry.multiplier must be >= 1.0".into()));
        }
        if self.pricing.cache_ttl_hours <= 0 {
            return Err(EngineError::Config("pricing.cache_ttl_hours must be positive".into()));
        }
        if self.inventory.disruption_window_hours <= 0 {
            return Err(EngineError::Config(
                "inventory.disruption_window_hours must be positive".into(),
            ));
        }
        if let Some(endpoint) = &self.catalog.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| EngineError::Config(format!("catalog.endpoint: {}", e)))?;
        }
        Ok(())
    }

    /// Retry policy for catalog calls
    pub fn catalog_retry_policy(&self) -> RetryPolicy {
        self.retry_policy(Duration::from_secs(self.catalog.request_timeout_secs))
    }

    /// Retry policy for inventory calls
    pub fn inventory_retry_policy(&self) -> RetryPolicy {
        self.retry_policy(Duration::from_secs(self.inventory.timeout_secs))
    }

    fn retry_policy(&self, attempt_timeout: Duration) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.retry.max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .with_multiplier(self.retry.multiplier)
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_attempt_timeout(attempt_timeout)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.pricing.cache_ttl_hours)
    }

    pub fn disruption_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.inventory.disruption_window_hours)
    }

    pub fn explainer_timeout(&self) -> Duration {
        Duration::from_secs(self.explainer.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.catalog.endpoint, None);
        assert_eq!(config.catalog.max_candidates, 15);
        assert_eq!(config.pricing.cache_ttl_hours, 24);
        assert_eq!(config.inventory.disruption_window_hours, 168);

        let retry = config.catalog_retry_policy();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
        assert_eq!(retry.max_delay, Duration::from_secs(5));
        assert_eq!(retry.attempt_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[catalog]
endpoint = "http://pricing.internal:8080"
max_candidates = 12

[retry]
max_attempts = 5
"#
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.catalog.endpoint.as_deref(), Some("http://pricing.internal:8080"));
        assert_eq!(config.catalog.max_candidates, 12);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.multiplier, 1.5);
        assert_eq!(config.explainer.timeout_secs, 20);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let mut config = EngineConfig::default();
        config.catalog.endpoint = Some("::not a url".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/fleet.toml")));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
