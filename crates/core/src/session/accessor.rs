//! Read-only view of a site's current bearer token

use siteauth_domain::TokenRecord;
use tokio::sync::watch;

/// Capability handed to API callers that need the current bearer token.
///
/// Backed by a watch channel owned by the refresh coordinator: every read is
/// a whole snapshot, either the token before a rotation or the one after it.
/// `None` means the session was force-logged-out or deactivated.
#[derive(Debug, Clone)]
pub struct TokenAccessor {
    site_id: String,
    rx: watch::Receiver<Option<TokenRecord>>,
}

impl TokenAccessor {
    pub(crate) const fn new(site_id: String, rx: watch::Receiver<Option<TokenRecord>>) -> Self {
        Self { site_id, rx }
    }

    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Snapshot of the current token record
    #[must_use]
    pub fn current(&self) -> Option<TokenRecord> {
        self.rx.borrow().clone()
    }

    /// Current access token, ready for an `Authorization: Bearer` header
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.rx.borrow().as_ref().map(|token| token.access_token.clone())
    }

    /// Wait until the coordinator publishes a different token.
    ///
    /// Returns `false` once the session is gone for good.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
