//! Application configuration loaded from environment variables.

use fulfillment::{FulfillmentConfig, RetryConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string; in-memory storage when unset
/// - `MAX_CONFLICT_RETRIES`: attempts per workflow on write conflicts (default: `3`)
/// - `SEED_DEMO_DATA`: load demo users, products and stock at start-up (default: `false`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub max_conflict_retries: u32,
    pub seed_demo_data: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_conflict_retries: lookup("MAX_CONFLICT_RETRIES")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_conflict_retries),
            seed_demo_data: lookup("SEED_DEMO_DATA")
                .map(|flag| matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.seed_demo_data),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Workflow settings derived from this configuration.
    pub fn fulfillment(&self) -> FulfillmentConfig {
        let retry = RetryConfig::default().with_max_attempts(self.max_conflict_retries);
        FulfillmentConfig::default().with_retry(retry)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            max_conflict_retries: 3,
            seed_demo_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_conflict_retries, 3);
        assert!(!config.seed_demo_data);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = from_pairs(&[
            ("PORT", "9090"),
            ("DATABASE_URL", "postgres://localhost/fulfillment"),
            ("MAX_CONFLICT_RETRIES", "7"),
            ("SEED_DEMO_DATA", "true"),
        ]);
        assert_eq!(config.port, 9090);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/fulfillment")
        );
        assert_eq!(config.max_conflict_retries, 7);
        assert!(config.seed_demo_data);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("MAX_CONFLICT_RETRIES", "-1"),
            ("DATABASE_URL", "  "),
            ("SEED_DEMO_DATA", "nope"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.database_url, None);
        assert!(!config.seed_demo_data);
    }

    #[test]
    fn test_fulfillment_config_carries_retry_budget() {
        let config = Config {
            max_conflict_retries: 5,
            ..Config::default()
        };
        assert_eq!(config.fulfillment().retry.max_attempts, 5);
        assert_eq!(config.fulfillment().default_payment_method, "CASH");
    }
}
