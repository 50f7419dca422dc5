//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Environment variables, when `SITEAUTH_SITE_DIRECTORY_PATH` is set
//! 2. Otherwise the first config file found by [`discover_config_path`]
//! 3. Otherwise built-in defaults
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `SITEAUTH_SITE_DIRECTORY_PATH`: Site directory JSON file (required for
//!   env loading)
//! - `SITEAUTH_KEYCHAIN_SERVICE`: Keychain service name
//! - `SITEAUTH_REFRESH_THRESHOLD_SECS`: Remaining lifetime that triggers a
//!   refresh
//! - `SITEAUTH_CHECK_INTERVAL_SECS`: Periodic trigger interval
//! - `SITEAUTH_REFRESH_TIMEOUT_SECS`: Upper bound for one refresh call
//! - `SITEAUTH_REJECTION_COOLDOWN_SECS`: Cooldown after a rejected refresh
//! - `SITEAUTH_HTTP_TIMEOUT_SECS`: HTTP client timeout
//! - `SITEAUTH_REDIRECT_URI`: Redirect URI for the authorization-code flow
//!
//! ## File Locations
//! The loader searches `siteauth.json` and `siteauth.toml` in the current
//! working directory, its parent, and the executable's directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use siteauth_domain::{Config, HttpConfig, Result, SessionConfig, SiteAuthError, StorageConfig};

const CONFIG_FILE_NAMES: [&str; 2] = ["siteauth.json", "siteauth.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `SiteAuthError::Config` if:
/// - An environment variable or config file holds an invalid value
/// - A config file exists but cannot be parsed
/// - The loaded configuration fails validation
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match discover_config_path() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("No config file found; using defaults");
                    Config::default()
                }
            }
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `SITEAUTH_SITE_DIRECTORY_PATH` must be set; every other variable falls
/// back to its default when absent.
///
/// # Errors
/// Returns `SiteAuthError::Config` if the required variable is missing or
/// a numeric variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let site_directory_path = PathBuf::from(env_var("SITEAUTH_SITE_DIRECTORY_PATH")?);

    let session_defaults = SessionConfig::default();
    let session = SessionConfig {
        refresh_threshold_secs: env_parse(
            "SITEAUTH_REFRESH_THRESHOLD_SECS",
            session_defaults.refresh_threshold_secs,
        )?,
        check_interval_secs: env_parse(
            "SITEAUTH_CHECK_INTERVAL_SECS",
            session_defaults.check_interval_secs,
        )?,
        refresh_timeout_secs: env_parse(
            "SITEAUTH_REFRESH_TIMEOUT_SECS",
            session_defaults.refresh_timeout_secs,
        )?,
        rejection_cooldown_secs: env_parse(
            "SITEAUTH_REJECTION_COOLDOWN_SECS",
            session_defaults.rejection_cooldown_secs,
        )?,
    };

    let storage = StorageConfig {
        keychain_service: std::env::var("SITEAUTH_KEYCHAIN_SERVICE")
            .unwrap_or_else(|_| StorageConfig::default().keychain_service),
        site_directory_path,
    };

    let http_defaults = HttpConfig::default();
    let http = HttpConfig {
        timeout_secs: env_parse("SITEAUTH_HTTP_TIMEOUT_SECS", http_defaults.timeout_secs)?,
        redirect_uri: std::env::var("SITEAUTH_REDIRECT_URI")
            .unwrap_or(http_defaults.redirect_uri),
    };

    Ok(Config { session, storage, http })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. JSON and TOML are
/// supported, detected by file extension. Sections and fields left out of
/// the file take their defaults.
///
/// # Errors
/// Returns `SiteAuthError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SiteAuthError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => discover_config_path().ok_or_else(|| {
            SiteAuthError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SiteAuthError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration content; format follows the file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SiteAuthError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SiteAuthError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SiteAuthError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the standard locations for a config file
///
/// Returns the first existing candidate, or `None`.
pub fn discover_config_path() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        let parent = cwd.join("..");
        dirs.extend([cwd, parent]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        SiteAuthError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable, falling back to `default`
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SiteAuthError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
