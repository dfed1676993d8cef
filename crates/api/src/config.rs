//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREKEEP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREKEEP_TOKEN_SECRET` - Token signing key (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREKEEP_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREKEEP_PORT` - Listen port (default: 8080)
//! - `STOREKEEP_ACCESS_TOKEN_TTL_SECS` - Access token lifetime (default: 900)
//! - `STOREKEEP_REFRESH_TOKEN_TTL_SECS` - Refresh token and session lifetime (default: 604800)
//! - `STOREKEEP_ENFORCE_SESSION_REVOCATION` - Check the session behind every
//!   access token (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! The environment is read once, in [`ApiConfig::from_env`]. Everything
//! downstream receives the parsed config.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::services::auth::SessionSettings;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Key that signs and verifies every access and refresh token
    pub token_secret: SecretString,
    /// Token lifetimes and auth gate policy
    pub sessions: SessionSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env
            .get("STOREKEEP_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("STOREKEEP_DATABASE_URL".to_string()))?;
        let host = env.parse_or("STOREKEEP_HOST", "127.0.0.1")?;
        let port = env.parse_or("STOREKEEP_PORT", "8080")?;

        let token_secret = SecretString::from(env.required("STOREKEEP_TOKEN_SECRET")?);
        validate_token_secret(&token_secret, "STOREKEEP_TOKEN_SECRET")?;
        validate_secret_strength(token_secret.expose_secret(), "STOREKEEP_TOKEN_SECRET")?;

        let access_ttl = env.seconds_or("STOREKEEP_ACCESS_TOKEN_TTL_SECS", 900)?;
        let refresh_ttl = env.seconds_or("STOREKEEP_REFRESH_TOKEN_TTL_SECS", 604_800)?;
        if access_ttl > refresh_ttl {
            return Err(ConfigError::InvalidEnvVar(
                "STOREKEEP_ACCESS_TOKEN_TTL_SECS".to_string(),
                "must not exceed STOREKEEP_REFRESH_TOKEN_TTL_SECS".to_string(),
            ));
        }
        let enforce_revocation = env.parse_or("STOREKEEP_ENFORCE_SESSION_REVOCATION", "true")?;

        Ok(Self {
            database_url,
            host,
            port,
            token_secret,
            sessions: SessionSettings {
                access_ttl,
                refresh_ttl,
                enforce_revocation,
            },
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get a variable, treating empty values as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .as_deref()
            .unwrap_or(default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn seconds_or(&self, key: &str, default: i64) -> Result<TimeDelta, ConfigError> {
        let secs: i64 = self.parse_or(key, &default.to_string())?;
        if secs <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be a positive number of seconds".to_string(),
            ));
        }
        TimeDelta::try_seconds(secs)
            .ok_or_else(|| ConfigError::InvalidEnvVar(key.to_string(), "out of range".to_string()))
    }
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GOOD_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("STOREKEEP_DATABASE_URL", "postgres://localhost/storekeep"),
            ("STOREKEEP_TOKEN_SECRET", GOOD_SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = load(&minimal()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.sessions, SessionSettings::default());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[
            ("DATABASE_URL", "postgres://fallback/db"),
            ("STOREKEEP_TOKEN_SECRET", GOOD_SECRET),
        ])
        .unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");

        let missing = load(&[("STOREKEEP_TOKEN_SECRET", GOOD_SECRET)]).unwrap_err();
        assert!(matches!(
            missing,
            ConfigError::MissingEnvVar(var) if var == "STOREKEEP_DATABASE_URL"
        ));
    }

    #[test]
    fn test_overrides() {
        let mut vars = minimal();
        vars.extend([
            ("STOREKEEP_HOST", "0.0.0.0"),
            ("STOREKEEP_PORT", "9000"),
            ("STOREKEEP_ACCESS_TOKEN_TTL_SECS", "60"),
            ("STOREKEEP_REFRESH_TOKEN_TTL_SECS", "3600"),
            ("STOREKEEP_ENFORCE_SESSION_REVOCATION", "false"),
            ("SENTRY_ENVIRONMENT", "staging"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9000");
        assert_eq!(config.sessions.access_ttl, TimeDelta::seconds(60));
        assert_eq!(config.sessions.refresh_ttl, TimeDelta::hours(1));
        assert!(!config.sessions.enforce_revocation);
        assert_eq!(config.sentry_environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("STOREKEEP_PORT", "http"),
            ("STOREKEEP_HOST", "localhost:80"),
            ("STOREKEEP_ACCESS_TOKEN_TTL_SECS", "0"),
            ("STOREKEEP_ENFORCE_SESSION_REVOCATION", "maybe"),
            ("STOREKEEP_ACCESS_TOKEN_TTL_SECS", "999999999"),
        ] {
            let mut vars = minimal();
            vars.push((key, value));
            assert!(
                matches!(load(&vars), Err(ConfigError::InvalidEnvVar(..))),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn test_token_secret_is_validated() {
        let repetitive = "ab".repeat(20);
        for secret in ["short", "changeme-changeme-changeme-changeme", repetitive.as_str()] {
            let err = load(&[
                ("STOREKEEP_DATABASE_URL", "postgres://localhost/storekeep"),
                ("STOREKEEP_TOKEN_SECRET", secret),
            ])
            .unwrap_err();
            assert!(matches!(err, ConfigError::InsecureSecret(..)), "{secret}");
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&minimal()).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains(GOOD_SECRET));
        assert!(!debug_output.contains("postgres://localhost/storekeep"));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }
}
