//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: `http://localhost:3000`);
//!   an `https` URL marks the session cookie `Secure`
//! - `CHECKOUT_COMMIT_STRATEGY` - `single-batch` (default) or `order-then-clear`
//! - `SHOPPER_IDLE_MINUTES` - Minutes before an idle shopper client is
//!   dropped (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! Backend selection (`BAZAAR_BACKEND`, `FIREBASE_*`) is documented in
//! [`bazaar_backend::config`].

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bazaar_backend::BackendConfig;
use thiserror::Error;

use crate::services::CommitStrategy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error(transparent)]
    Backend(#[from] bazaar_backend::ConfigError),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// How checkout persists the order and clears the cart
    pub commit_strategy: CommitStrategy,
    /// Idle time before a shopper's client is dropped
    pub shopper_idle_timeout: Duration,
    /// Hosted backend selection
    pub backend: BackendConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or the
    /// selected backend is missing required settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");
        let commit_strategy = parse_env("CHECKOUT_COMMIT_STRATEGY", "single-batch")?;
        let idle_minutes: u64 = parse_env("SHOPPER_IDLE_MINUTES", "30")?;
        let backend = BackendConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            commit_strategy,
            shopper_idle_timeout: Duration::from_secs(idle_minutes.saturating_mul(60)),
            backend,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Local defaults: in-memory backend on 127.0.0.1:3000.
    #[must_use]
    pub fn local() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            commit_strategy: CommitStrategy::default(),
            shopper_idle_timeout: crate::client::CLIENT_IDLE_TIMEOUT,
            backend: BackendConfig::Memory,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig::local();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_is_secure_follows_base_url() {
        let mut config = StorefrontConfig::local();
        assert!(!config.is_secure());
        config.base_url = "https://shop.example.com".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_parse_env_default_and_invalid() {
        let port: u16 = parse_env("BAZAAR_TEST_UNSET_PORT_VAR", "3000").unwrap();
        assert_eq!(port, 3000);

        let strategy: Result<CommitStrategy, _> =
            parse_env("BAZAAR_TEST_UNSET_STRATEGY_VAR", "sometimes");
        assert!(matches!(strategy, Err(ConfigError::InvalidEnvVar(key, _)) if key == "BAZAAR_TEST_UNSET_STRATEGY_VAR"));
    }
}
