//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use checkout::{DEFAULT_FALLBACK_FEE, DEFAULT_GATEWAY_TIMEOUT};
use domain::{Currency, Money};
use inventory::{DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL, DEFAULT_RESERVATION_TTL};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Credentials of the HTTP payment gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on the in-memory store
/// - `RESERVATION_TTL_SECS`, `REAPER_INTERVAL_SECS`, `REAPER_BATCH_SIZE`
/// - `REAPER_SECRET`: bearer token for the manual reaper trigger
/// - `WEBHOOK_SECRET`: shared secret for payment webhook signatures
/// - `GATEWAY_BASE_URL`, `GATEWAY_KEY_ID`, `GATEWAY_KEY_SECRET`, `GATEWAY_TIMEOUT_MS`
/// - `CHECKOUT_RATE_LIMIT`, `CHECKOUT_RATE_WINDOW_SECS`
/// - `CURRENCY`, `FALLBACK_SHIPPING_FEE` (minor units)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub reservation_ttl: Duration,
    pub reaper_interval: Duration,
    pub reaper_batch_size: usize,
    pub reaper_secret: Option<String>,
    pub webhook_secret: Option<String>,
    /// `None` runs against the in-memory gateway.
    pub gateway: Option<GatewayConfig>,
    pub gateway_timeout: Duration,
    pub checkout_rate_limit: u32,
    pub checkout_rate_window: Duration,
    pub currency: Currency,
    pub fallback_shipping_fee: Money,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup. Unparsable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        let gateway = match (
            var("GATEWAY_BASE_URL"),
            var("GATEWAY_KEY_ID"),
            var("GATEWAY_KEY_SECRET"),
        ) {
            (Some(base_url), Some(key_id), Some(key_secret)) => Some(GatewayConfig {
                base_url,
                key_id,
                key_secret,
            }),
            _ => None,
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL"),
            reservation_ttl: parsed("RESERVATION_TTL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reservation_ttl),
            reaper_interval: parsed("REAPER_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            reaper_batch_size: parsed("REAPER_BATCH_SIZE")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.reaper_batch_size),
            reaper_secret: var("REAPER_SECRET"),
            webhook_secret: var("WEBHOOK_SECRET"),
            gateway,
            gateway_timeout: parsed("GATEWAY_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.gateway_timeout),
            checkout_rate_limit: parsed("CHECKOUT_RATE_LIMIT")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.checkout_rate_limit),
            checkout_rate_window: parsed("CHECKOUT_RATE_WINDOW_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.checkout_rate_window),
            currency: var("CURRENCY")
                .and_then(|c| Currency::from_str(&c).ok())
                .unwrap_or(defaults.currency),
            fallback_shipping_fee: parsed("FALLBACK_SHIPPING_FEE")
                .and_then(|fee| i64::try_from(fee).ok())
                .map(Money::from_minor)
                .unwrap_or(defaults.fallback_shipping_fee),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            reservation_ttl: DEFAULT_RESERVATION_TTL,
            reaper_interval: DEFAULT_INTERVAL,
            reaper_batch_size: DEFAULT_BATCH_SIZE,
            reaper_secret: None,
            webhook_secret: None,
            gateway: None,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            checkout_rate_limit: 5,
            checkout_rate_window: Duration::from_secs(60),
            currency: Currency::Inr,
            fallback_shipping_fee: DEFAULT_FALLBACK_FEE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reservation_ttl, Duration::from_secs(900));
        assert_eq!(config.reaper_interval, Duration::from_secs(300));
        assert_eq!(config.reaper_batch_size, 500);
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.fallback_shipping_fee.minor(), 4_900);
        assert!(config.database_url.is_none());
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
    fn test_from_lookup() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("RESERVATION_TTL_SECS", "600"),
            ("REAPER_BATCH_SIZE", "50"),
            ("REAPER_SECRET", "cron-token"),
            ("GATEWAY_BASE_URL", "https://pay.example.com/v1"),
            ("GATEWAY_KEY_ID", "key"),
            ("GATEWAY_KEY_SECRET", "secret"),
            ("GATEWAY_TIMEOUT_MS", "2500"),
            ("CURRENCY", "usd"),
            ("FALLBACK_SHIPPING_FEE", "999"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.reservation_ttl, Duration::from_secs(600));
        assert_eq!(config.reaper_batch_size, 50);
        assert_eq!(config.reaper_secret.as_deref(), Some("cron-token"));
        assert_eq!(config.gateway.unwrap().key_id, "key");
        assert_eq!(config.gateway_timeout, Duration::from_millis(2_500));
        assert_eq!(config.currency, Currency::Usd);
        assert_eq!(config.fallback_shipping_fee.minor(), 999);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "http"),
            ("RESERVATION_TTL_SECS", "0"),
            ("CHECKOUT_RATE_LIMIT", "-1"),
            ("CURRENCY", "XYZ"),
            ("GATEWAY_BASE_URL", "https://pay.example.com"),
            ("REAPER_SECRET", "  "),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.reservation_ttl, Duration::from_secs(900));
        assert_eq!(config.checkout_rate_limit, 5);
        assert_eq!(config.currency, Currency::Inr);
        // Incomplete gateway credentials mean the in-memory gateway.
        assert!(config.gateway.is_none());
        assert!(config.reaper_secret.is_none());
    }
}
