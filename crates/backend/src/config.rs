//! Backend selection loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `BAZAAR_BACKEND` - `memory` (default) or `firebase`
//!
//! ## Required for `firebase`
//! - `FIREBASE_PROJECT_ID` - Firebase project id
//! - `FIREBASE_API_KEY` - Web API key for the Identity Toolkit
//!
//! ## Optional
//! - `FIRESTORE_EMULATOR_HOST` - `host:port` of a local Firestore emulator
//! - `FIREBASE_AUTH_EMULATOR_HOST` - `host:port` of a local Auth emulator
//! - `FIRESTORE_ACCESS_TOKEN` - OAuth bearer token for Firestore requests
//! - `FIRESTORE_REFRESH_SECS` - Live query refresh interval (default: 5)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_REFRESH_SECS: u64 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which backend the binaries talk to.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Process-local store and auth; state is lost on exit.
    Memory,
    Firebase(FirebaseConfig),
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Firebase project id
    pub project_id: String,
    /// Web API key used by the Identity Toolkit REST API
    pub api_key: SecretString,
    /// Firestore emulator `host:port`, if running against the emulator suite
    pub firestore_emulator_host: Option<String>,
    /// Auth emulator `host:port`
    pub auth_emulator_host: Option<String>,
    /// Bearer token for Firestore (service account access token)
    pub access_token: Option<SecretString>,
    /// How often live queries re-read when no local commit triggered them
    pub refresh_interval: Duration,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("firestore_emulator_host", &self.firestore_emulator_host)
            .field("auth_emulator_host", &self.auth_emulator_host)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

impl BackendConfig {
    /// Load the backend selection from environment variables.
    ///
    /// Callers are expected to have loaded `.env` already.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `BAZAAR_BACKEND` is unknown or a Firebase
    /// variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("BAZAAR_BACKEND", "memory").as_str() {
            "memory" => Ok(Self::Memory),
            "firebase" => Ok(Self::Firebase(FirebaseConfig::from_env()?)),
            other => Err(ConfigError::InvalidEnvVar(
                "BAZAAR_BACKEND".to_string(),
                format!("expected 'memory' or 'firebase', got '{other}'"),
            )),
        }
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let refresh_secs = get_env_or_default("FIRESTORE_REFRESH_SECS", "5")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("FIRESTORE_REFRESH_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            api_key: SecretString::from(get_required_env("FIREBASE_API_KEY")?),
            firestore_emulator_host: get_optional_env("FIRESTORE_EMULATOR_HOST"),
            auth_emulator_host: get_optional_env("FIREBASE_AUTH_EMULATOR_HOST"),
            access_token: get_optional_env("FIRESTORE_ACCESS_TOKEN").map(SecretString::from),
            refresh_interval: Duration::from_secs(if refresh_secs == 0 {
                DEFAULT_REFRESH_SECS
            } else {
                refresh_secs
            }),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
