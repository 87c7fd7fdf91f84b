//! Configuration management for Mirante.
//!
//! This module handles loading configuration from environment variables,
//! with validation to ensure all required values are present.

use crate::error::MiranteError;
use crate::reconcile::ReconcileOptions;
use std::env;

/// Default generic department names that do not count as a real human queue.
const DEFAULT_GENERIC_DEPARTMENTS: &[&str] = &["Geral", "Sem Setor"];

/// Configuration for connecting to the Opa Suite API.
///
/// Required fields are loaded from environment variables. The API token
/// is stored but never logged or exposed in error messages.
#[derive(Clone)]
pub struct Config {
    /// Base URL for the Opa Suite instance (e.g., `https://example.opasuite.com.br`).
    pub base_url: String,

    /// Bearer token for authentication.
    /// This value must never be logged or included in error messages.
    pub api_token: String,

    /// Department names treated as "not yet routed to a human queue"
    /// by the status classifier.
    pub generic_departments: Vec<String>,

    /// Optional display ceiling for elapsed durations, in hours.
    /// When unset, durations are reported unclamped.
    pub max_duration_hours: Option<u32>,

    /// Optional polling interval in seconds. When unset, the binary runs
    /// a single fetch-reconcile cycle and exits.
    pub poll_secs: Option<u64>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `OPA_BASE_URL`: The base URL of the Opa Suite instance
    /// - `OPA_API_TOKEN`: The API token for authentication
    ///
    /// # Optional Environment Variables
    ///
    /// - `MIRANTE_GENERIC_DEPARTMENTS`: Comma-separated department names
    ///   that do not count as a real queue (default: `Geral,Sem Setor`)
    /// - `MIRANTE_MAX_DURATION_HOURS`: Ceiling for reported durations
    /// - `MIRANTE_POLL_SECS`: Refresh interval for continuous polling
    ///
    /// # Errors
    ///
    /// Returns `MiranteError::Config` if any required variable is missing
    /// or if values fail validation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// dotenvy::dotenv().ok();
    /// let config = Config::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, MiranteError> {
        let base_url = Self::get_required_env("OPA_BASE_URL")?;
        let api_token = Self::get_required_env("OPA_API_TOKEN")?;

        // Validate base URL format
        let base_url = Self::validate_base_url(base_url)?;

        // Validate token is not empty or placeholder
        Self::validate_api_token(&api_token)?;

        let generic_departments = match env::var("MIRANTE_GENERIC_DEPARTMENTS") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_GENERIC_DEPARTMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let max_duration_hours = Self::get_optional_number("MIRANTE_MAX_DURATION_HOURS")?;
        let poll_secs = Self::get_optional_number("MIRANTE_POLL_SECS")?;

        Ok(Config {
            base_url,
            api_token,
            generic_departments,
            max_duration_hours,
            poll_secs,
        })
    }

    /// Returns the reconciliation options derived from this configuration.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            generic_departments: self.generic_departments.clone(),
            max_duration_hours: self.max_duration_hours,
            ..ReconcileOptions::default()
        }
    }

    /// Gets a required environment variable, returning an error if missing or empty.
    fn get_required_env(name: &str) -> Result<String, MiranteError> {
        env::var(name)
            .map_err(|_| MiranteError::missing_env(name))
            .and_then(|value| {
                if value.trim().is_empty() {
                    Err(MiranteError::missing_env(name))
                } else {
                    Ok(value)
                }
            })
    }

    /// Gets an optional numeric environment variable.
    fn get_optional_number<T: TryFrom<u64>>(name: &str) -> Result<Option<T>, MiranteError> {
        match env::var(name) {
            Ok(value) => Self::parse_positive(name, &value).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Parses a strictly positive integer. Zero is rejected: a zero poll
    /// interval or duration ceiling is never meaningful, and
    /// `tokio::time::interval` panics on a zero period.
    fn parse_positive<T: TryFrom<u64>>(name: &str, value: &str) -> Result<T, MiranteError> {
        let parsed: u64 = value.trim().parse().map_err(|_| {
            MiranteError::invalid_config(format!("{} must be a positive integer", name))
        })?;
        if parsed == 0 {
            return Err(MiranteError::invalid_config(format!(
                "{} must be a positive integer",
                name
            )));
        }
        T::try_from(parsed)
            .map_err(|_| MiranteError::invalid_config(format!("{} is out of range", name)))
    }

    /// Validates and normalizes the base URL.
    fn validate_base_url(url: String) -> Result<String, MiranteError> {
        let url = url.trim().to_string();

        // Remove trailing slash for consistency
        let url = url.trim_end_matches('/').to_string();

        // Basic URL validation
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(MiranteError::invalid_config(
                "OPA_BASE_URL must start with http:// or https://",
            ));
        }

        Ok(url)
    }

    /// Validates the API token is not a placeholder value.
    fn validate_api_token(token: &str) -> Result<(), MiranteError> {
        let token_lower = token.to_lowercase();
        let placeholder_patterns = [
            "your_api_token",
            "your_token",
            "placeholder",
            "xxx",
            "changeme",
        ];

        for pattern in placeholder_patterns {
            if token_lower.contains(pattern) {
                return Err(MiranteError::invalid_config(
                    "OPA_API_TOKEN appears to be a placeholder value",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: Tests that modify environment variables should not run in parallel.
    // Use `cargo test -- --test-threads=1` for full integration tests.

    #[test]
    fn test_validate_base_url_removes_trailing_slash() {
        let result = Config::validate_base_url("https://example.com/".to_string()).unwrap();
        assert_eq!(result, "https://example.com");
    }

    #[test]
    fn test_validate_base_url_requires_scheme() {
        let result = Config::validate_base_url("example.com".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_api_token_rejects_placeholder() {
        let result = Config::validate_api_token("your_api_token_here");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_api_token_accepts_real_token() {
        let result = Config::validate_api_token("abc123def456");
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_generic_departments() {
        assert_eq!(DEFAULT_GENERIC_DEPARTMENTS, &["Geral", "Sem Setor"]);
    }

    #[test]
    fn test_parse_positive_accepts_positive_values() {
        let secs: u64 = Config::parse_positive("MIRANTE_POLL_SECS", "15").unwrap();
        assert_eq!(secs, 15);
        let hours: u32 = Config::parse_positive("MIRANTE_MAX_DURATION_HOURS", " 100 ").unwrap();
        assert_eq!(hours, 100);
    }

    #[test]
    fn test_parse_positive_rejects_zero() {
        // A zero poll interval would panic in tokio::time::interval.
        let result = Config::parse_positive::<u64>("MIRANTE_POLL_SECS", "0");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_positive_rejects_garbage_negative_and_overflow() {
        assert!(Config::parse_positive::<u64>("MIRANTE_POLL_SECS", "abc").is_err());
        assert!(Config::parse_positive::<u64>("MIRANTE_POLL_SECS", "-5").is_err());
        assert!(Config::parse_positive::<u32>("MIRANTE_MAX_DURATION_HOURS", "5000000000").is_err());
    }
}
