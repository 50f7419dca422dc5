//! Configuration structures
//!
//! Every section deserializes with defaults, so a config file only needs to
//! name the values it overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_KEYCHAIN_SERVICE,
    DEFAULT_REDIRECT_URI, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_REFRESH_TIMEOUT_SECS,
    DEFAULT_REJECTION_COOLDOWN_SECS, DEFAULT_SITE_DIRECTORY_FILE,
};
use crate::{Result, SiteAuthError};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Validate all sections.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.storage.validate()?;
        self.http.validate()
    }
}

/// Refresh lifecycle tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Refresh once remaining token lifetime drops to this many seconds
    pub refresh_threshold_secs: u64,
    /// Periodic trigger interval; must stay below the threshold
    pub check_interval_secs: u64,
    /// Upper bound for a single refresh round-trip
    pub refresh_timeout_secs: u64,
    /// How long a site stays in cooldown after its credential is rejected
    pub rejection_cooldown_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            rejection_cooldown_secs: DEFAULT_REJECTION_COOLDOWN_SECS,
        }
    }
}

impl SessionConfig {
    /// Ensure a token can never expire between two periodic checks.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Config` when the interval is zero, the timeout
    /// is zero, or the threshold is not strictly greater than the interval.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 {
            return Err(SiteAuthError::Config("check_interval_secs must be > 0".to_string()));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(SiteAuthError::Config("refresh_timeout_secs must be > 0".to_string()));
        }
        if self.refresh_threshold_secs <= self.check_interval_secs {
            return Err(SiteAuthError::Config(format!(
                "refresh_threshold_secs ({}) must be greater than check_interval_secs ({})",
                self.refresh_threshold_secs, self.check_interval_secs
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    #[must_use]
    pub const fn rejection_cooldown(&self) -> Duration {
        Duration::from_secs(self.rejection_cooldown_secs)
    }
}

/// Durable storage locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Keychain service name holding per-site token records
    pub keychain_service: String,
    /// JSON file backing the site directory
    pub site_directory_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            site_directory_path: PathBuf::from(DEFAULT_SITE_DIRECTORY_FILE),
        }
    }
}

impl StorageConfig {
    /// # Errors
    /// Returns `SiteAuthError::Config` if the keychain service is blank.
    pub fn validate(&self) -> Result<()> {
        if self.keychain_service.trim().is_empty() {
            return Err(SiteAuthError::Config("keychain_service must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Token endpoint HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Redirect URI registered for the authorization-code flow
    pub redirect_uri: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl HttpConfig {
    /// # Errors
    /// Returns `SiteAuthError::Config` if the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(SiteAuthError::Config("http timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.refresh_threshold(), Duration::from_secs(720));
        assert_eq!(config.session.check_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_threshold_must_exceed_interval() {
        let session = SessionConfig {
            refresh_threshold_secs: 300,
            check_interval_secs: 300,
            ..SessionConfig::default()
        };
        assert!(matches!(session.validate(), Err(SiteAuthError::Config(_))));
    }

    #[test]
    fn test_zero_values_rejected() {
        let session = SessionConfig { check_interval_secs: 0, ..SessionConfig::default() };
        assert!(session.validate().is_err());

        let http = HttpConfig { timeout_secs: 0, ..HttpConfig::default() };
        assert!(http.validate().is_err());

        let storage = StorageConfig { keychain_service: "  ".into(), ..StorageConfig::default() };
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [session]
            refresh_threshold_secs = 900
            "#,
        )
        .unwrap();

        assert_eq!(config.session.refresh_threshold_secs, 900);
        assert_eq!(config.session.check_interval_secs, DEFAULT_CHECK_INTERVAL_SECS);
        assert_eq!(config.storage, StorageConfig::default());
    }
}
