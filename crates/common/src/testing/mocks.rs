//! Mock implementations of common traits

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::security::{KeychainError, SecretStore};

type StorageData = Arc<Mutex<HashMap<String, String>>>;

/// In-memory stand-in for the platform keychain.
///
/// Clones share storage, so a test can keep one handle for assertions while
/// the code under test owns another.
#[derive(Debug, Clone)]
pub struct MockKeychainProvider {
    storage: StorageData,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
    service_name: String,
}

impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(AtomicUsize::new(0)),
            service_name: service_name.into(),
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make every subsequent `set_secret`/`delete_secret` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get_secret` fail with `AccessFailed`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set_secret` calls
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Determine whether a secret exists.
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.storage.lock().contains_key(key)
    }

    /// Raw stored value, bypassing failure injection
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.storage.lock().get(key).cloned()
    }

    fn write_guard(&self, key: &str) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("mock write failure for {key}")));
        }
        Ok(())
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.write_guard(key)?;
        self.storage.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("mock read failure for {key}")));
        }
        self.storage.lock().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.write_guard(key)?;
        self.storage.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let keychain = MockKeychainProvider::new("test");
        let observer = keychain.clone();

        keychain.set_secret("k", "v").unwrap();
        assert_eq!(observer.raw("k").as_deref(), Some("v"));
        assert_eq!(observer.write_count(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let keychain = MockKeychainProvider::new("test");
        keychain.set_secret("k", "v").unwrap();

        keychain.set_fail_writes(true);
        assert!(keychain.set_secret("k", "w").is_err());
        assert!(keychain.delete_secret("k").is_err());
        assert_eq!(keychain.raw("k").as_deref(), Some("v"));

        keychain.set_fail_reads(true);
        assert!(matches!(keychain.get_secret("k"), Err(KeychainError::AccessFailed(_))));
    }
}
