//! Port interfaces for session lifecycle management
//!
//! These traits define the boundaries between core business logic and the
//! keychain, filesystem and HTTP adapters in `siteauth-infra`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use siteauth_domain::{
    ExchangeError, RefreshError, Result, RevokeError, SiteRecord, SiteRecordPatch, StorageError,
    TokenRecord,
};

/// Durable, confidential storage holding at most one token record per site
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Replace the record for `site_id` in a single all-or-nothing write
    async fn put(&self, site_id: &str, record: &TokenRecord) -> std::result::Result<(), StorageError>;

    async fn get(&self, site_id: &str) -> std::result::Result<Option<TokenRecord>, StorageError>;

    /// Remove the record for `site_id` (idempotent)
    async fn delete(&self, site_id: &str) -> std::result::Result<(), StorageError>;
}

/// Durable, non-confidential site metadata plus the default-site pointer
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn list(&self) -> std::result::Result<BTreeMap<String, SiteRecord>, StorageError>;

    async fn get(&self, site_id: &str) -> std::result::Result<Option<SiteRecord>, StorageError>;

    /// Merge `patch` into the stored record (later writes win per field),
    /// creating it when absent. Returns the merged record.
    async fn upsert(
        &self,
        site_id: &str,
        patch: SiteRecordPatch,
    ) -> std::result::Result<SiteRecord, StorageError>;

    /// Remove the site; also clears the default pointer if it names the site
    async fn remove(&self, site_id: &str) -> std::result::Result<(), StorageError>;

    async fn get_default(&self) -> std::result::Result<Option<String>, StorageError>;

    /// Point the default at a known site
    async fn set_default(&self, site_id: &str) -> std::result::Result<(), StorageError>;

    async fn clear_default(&self) -> std::result::Result<(), StorageError>;
}

/// Stateless remote operations against one site's authorization server.
///
/// Implementations never retry; retry policy belongs to the coordinator.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Refresh-token grant
    async fn refresh(
        &self,
        site: &SiteRecord,
        refresh_token: &str,
    ) -> std::result::Result<TokenRecord, RefreshError>;

    /// Best-effort revocation (RFC 7009)
    async fn revoke(&self, site: &SiteRecord, access_token: &str)
        -> std::result::Result<(), RevokeError>;

    /// Authorization-code grant with PKCE verifier
    async fn exchange_code(
        &self,
        site: &SiteRecord,
        code: &str,
        verifier: &str,
    ) -> std::result::Result<TokenRecord, ExchangeError>;

    /// Fetch display metadata published by the site
    async fn fetch_site_metadata(&self, site: &SiteRecord) -> Result<SiteRecordPatch>;
}

/// Last-known network reachability
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}
