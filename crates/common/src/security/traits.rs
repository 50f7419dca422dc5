//! Trait abstractions for secret storage

use super::keychain::KeychainError;

/// Synchronous key/value secret storage scoped to one service name.
///
/// Each `set_secret` replaces the whole value for `key` in a single write.
pub trait SecretStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the backing store rejects the
    /// write.
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// # Errors
    /// Returns `KeychainError::NotFound` if nothing is stored under `key`.
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Remove `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the backing store fails.
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;
}
