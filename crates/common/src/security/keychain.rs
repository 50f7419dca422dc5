//! Keychain provider for secure credential storage
//!
//! Thin wrapper over the platform keychain (macOS Keychain Access, Windows
//! Credential Manager, Linux Secret Service) through `keyring`. Entries are
//! private to the calling application's service name.
//!
//! ## Usage
//!
//! ```no_run
//! use siteauth_common::security::{KeychainProvider, SecretStore};
//!
//! let keychain = KeychainProvider::new("SiteAuth.credentials");
//! keychain.set_secret("token.alpha", "{\"access_token\":\"...\"}")?;
//! let secret = keychain.get_secret("token.alpha")?;
//! # Ok::<(), siteauth_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use super::traits::SecretStore;

/// Keychain-backed [`SecretStore`]
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a provider scoped to `service_name` (e.g. "SiteAuth.credentials")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Check if a secret exists in the keychain
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.create_entry(key).is_ok_and(|entry| entry.get_password().is_ok())
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

impl SecretStore for KeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                KeychainError::NotFound
            } else {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {e}"))
            }
        })
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }
}

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying keyring library error
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}
