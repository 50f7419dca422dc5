//! Keychain-backed credential store
//!
//! Each site's token record is serialized to one JSON value stored under the
//! account `token.{site_id}`, so replacing a record is a single keychain
//! write and a failed write leaves the previous value in place.

use std::sync::Arc;

use async_trait::async_trait;
use siteauth_common::security::{KeychainError, SecretStore};
use siteauth_core::CredentialStore;
use siteauth_domain::{StorageError, TokenRecord};
use tracing::debug;

use crate::errors::keychain_storage_error;

const ACCOUNT_PREFIX: &str = "token.";

/// [`CredentialStore`] over any [`SecretStore`]
pub struct KeychainCredentialStore {
    secrets: Arc<dyn SecretStore>,
}

impl KeychainCredentialStore {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    fn account(site_id: &str) -> String {
        format!("{ACCOUNT_PREFIX}{site_id}")
    }

    /// Run a blocking keychain call off the async worker threads
    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SecretStore) -> Result<T, KeychainError> + Send + 'static,
    {
        let secrets = Arc::clone(&self.secrets);
        tokio::task::spawn_blocking(move || op(secrets.as_ref()))
            .await
            .map_err(|err| StorageError::Unavailable(format!("keychain task failed: {err}")))?
            .map_err(keychain_storage_error)
    }
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn put(&self, site_id: &str, record: &TokenRecord) -> Result<(), StorageError> {
        let payload =
            serde_json::to_string(record).map_err(|err| StorageError::Corrupt(err.to_string()))?;
        let account = Self::account(site_id);

        self.blocking(move |secrets| secrets.set_secret(&account, &payload)).await?;
        debug!(site_id = %site_id, "Token record stored");
        Ok(())
    }

    async fn get(&self, site_id: &str) -> Result<Option<TokenRecord>, StorageError> {
        let account = Self::account(site_id);
        let payload = self
            .blocking(move |secrets| match secrets.get_secret(&account) {
                Ok(payload) => Ok(Some(payload)),
                Err(KeychainError::NotFound) => Ok(None),
                Err(err) => Err(err),
            })
            .await?;

        payload
            .map(|payload| {
                serde_json::from_str::<TokenRecord>(&payload).map_err(|err| {
                    StorageError::Corrupt(format!("token record for {site_id}: {err}"))
                })
            })
            .transpose()
    }

    async fn delete(&self, site_id: &str) -> Result<(), StorageError> {
        let account = Self::account(site_id);
        self.blocking(move |secrets| secrets.delete_secret(&account)).await?;
        debug!(site_id = %site_id, "Token record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::credential_store.
    use chrono::{DateTime, Utc};
    use siteauth_common::testing::MockKeychainProvider;

    use super::*;

    fn record(access: &str) -> TokenRecord {
        let issued = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        TokenRecord::new(access, "refresh", issued, Some(600))
    }

    fn store() -> (KeychainCredentialStore, MockKeychainProvider) {
        let keychain = MockKeychainProvider::new("SiteAuth.test");
        (KeychainCredentialStore::new(Arc::new(keychain.clone())), keychain)
    }

    /// Validates the storage round trip.
    ///
    /// Assertions:
    /// - `get` after `put` returns an equal record
    /// - The record lives under the per-site account
    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (store, keychain) = store();
        let token = record("access");

        store.put("acme", &token).await.unwrap();

        assert_eq!(store.get("acme").await.unwrap(), Some(token));
        assert!(keychain.secret_exists("token.acme"));
    }

    /// Validates that the persisted value never carries an identity token.
    ///
    /// Assertions:
    /// - Stored JSON has exactly the four record fields
    #[tokio::test]
    async fn stored_value_has_only_record_fields() {
        let (store, keychain) = store();
        store.put("acme", &record("access")).await.unwrap();

        let raw = keychain.raw("token.acme").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();

        assert_eq!(keys, ["access_token", "expires_in", "issued_at", "refresh_token"]);
        assert_eq!(value["issued_at"], 1_700_000_000);
    }

    /// Validates reads of a site without a record.
    ///
    /// Assertions:
    /// - `get` returns `None` and `delete` succeeds
    #[tokio::test]
    async fn missing_record_is_none_and_delete_is_idempotent() {
        let (store, _) = store();

        assert_eq!(store.get("ghost").await.unwrap(), None);
        store.delete("ghost").await.unwrap();
    }

    /// Validates that a failed write keeps the previous record.
    ///
    /// Assertions:
    /// - `put` reports `Unavailable`
    /// - The old record is still returned
    #[tokio::test]
    async fn failed_write_preserves_previous_record() {
        let (store, keychain) = store();
        store.put("acme", &record("old")).await.unwrap();
        keychain.set_fail_writes(true);

        let err = store.put("acme", &record("new")).await.unwrap_err();

        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(store.get("acme").await.unwrap().map(|t| t.access_token), Some("old".into()));
    }

    /// Validates handling of an undecodable stored value.
    ///
    /// Assertions:
    /// - `get` reports `Corrupt`
    #[tokio::test]
    async fn garbage_in_keychain_is_corrupt() {
        let (store, keychain) = store();
        keychain.set_secret("token.acme", "not json").unwrap();

        let err = store.get("acme").await.unwrap_err();

        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    /// Validates per-site isolation.
    ///
    /// Assertions:
    /// - Deleting one site leaves the other untouched
    #[tokio::test]
    async fn sites_are_isolated() {
        let (store, _) = store();
        store.put("a", &record("a-token")).await.unwrap();
        store.put("b", &record("b-token")).await.unwrap();

        store.delete("a").await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(store.get("b").await.unwrap().map(|t| t.access_token), Some("b-token".into()));
    }
}
