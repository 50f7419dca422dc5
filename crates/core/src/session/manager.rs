//! Session manager - activation, switching and explicit logout

use std::sync::Arc;

use siteauth_domain::{BootstrapError, Result, SessionStatus, SiteRecord, TokenRecord};
use tracing::{debug, info, warn};

use super::accessor::TokenAccessor;
use super::bootstrap::SessionBootstrapper;
use super::coordinator::RefreshCoordinator;
use super::events::{EventBus, SessionEvent};
use super::ports::{CredentialStore, SiteDirectory, TokenEndpoint};
use super::triggers::TriggerMultiplexer;

/// Orchestrates which site is active and tears sessions down on logout
pub struct SessionManager {
    bootstrapper: SessionBootstrapper,
    coordinator: Arc<RefreshCoordinator>,
    multiplexer: Arc<TriggerMultiplexer>,
    directory: Arc<dyn SiteDirectory>,
    credentials: Arc<dyn CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    events: EventBus,
}

impl SessionManager {
    pub fn new(
        bootstrapper: SessionBootstrapper,
        coordinator: Arc<RefreshCoordinator>,
        multiplexer: Arc<TriggerMultiplexer>,
        directory: Arc<dyn SiteDirectory>,
        credentials: Arc<dyn CredentialStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        events: EventBus,
    ) -> Self {
        Self { bootstrapper, coordinator, multiplexer, directory, credentials, endpoint, events }
    }

    /// Make `site_id` the active site, deactivating the previous one.
    ///
    /// # Errors
    /// Propagates the bootstrapper's `BootstrapError`; the previous site
    /// stays deactivated either way, and a failed site is no longer active.
    pub async fn activate(&self, site_id: &str) -> std::result::Result<TokenAccessor, BootstrapError> {
        if let Some(previous) = self.multiplexer.active_site() {
            if previous != site_id {
                self.multiplexer.clear_active_site(&previous);
                self.coordinator.deactivate(&previous);
                info!(from = %previous, to = %site_id, "Switching active site");
            }
        }

        match self.bootstrapper.activate(site_id).await {
            Ok(accessor) => {
                self.multiplexer.set_active_site(site_id);
                Ok(accessor)
            }
            Err(err) => {
                self.multiplexer.clear_active_site(site_id);
                self.coordinator.deactivate(site_id);
                Err(err)
            }
        }
    }

    /// Activate the default site, if one is set.
    ///
    /// # Errors
    /// Same as [`SessionManager::activate`].
    pub async fn activate_default(
        &self,
    ) -> std::result::Result<Option<TokenAccessor>, BootstrapError> {
        match self.directory.get_default().await? {
            Some(site_id) => self.activate(&site_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drop the in-memory session for `site_id` without touching storage.
    pub fn deactivate(&self, site_id: &str) {
        self.multiplexer.clear_active_site(site_id);
        self.coordinator.deactivate(site_id);
    }

    /// Sign out of `site_id`: forget the session, the stored credential and
    /// the site record, then revoke the access token best-effort.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Storage` if the credential or site record
    /// cannot be removed. The in-memory session is gone regardless.
    pub async fn logout(&self, site_id: &str) -> Result<()> {
        self.multiplexer.clear_active_site(site_id);
        let in_memory = self.coordinator.retire(site_id);
        let token = match in_memory {
            Some(token) => Some(token),
            None => self.credentials.get(site_id).await.unwrap_or_else(|err| {
                warn!(site_id = %site_id, error = %err, "Could not read credential for revocation");
                None
            }),
        };
        let site = self.directory.get(site_id).await.ok().flatten();

        self.credentials.delete(site_id).await?;
        if self.directory.get_default().await?.as_deref() == Some(site_id) {
            self.directory.clear_default().await?;
        }
        self.directory.remove(site_id).await?;

        if let (Some(site), Some(token)) = (site, token) {
            self.spawn_revoke(site, token);
        }

        info!(site_id = %site_id, "Logged out");
        self.events.publish(SessionEvent::LoggedOut { site_id: site_id.to_string() });
        Ok(())
    }

    #[must_use]
    pub fn active_site(&self) -> Option<String> {
        self.multiplexer.active_site()
    }

    #[must_use]
    pub fn accessor(&self, site_id: &str) -> Option<TokenAccessor> {
        self.coordinator.accessor(site_id)
    }

    #[must_use]
    pub fn status(&self, site_id: &str) -> Option<SessionStatus> {
        self.coordinator.status(site_id)
    }

    fn spawn_revoke(&self, site: SiteRecord, token: TokenRecord) {
        let endpoint = Arc::clone(&self.endpoint);
        tokio::spawn(async move {
            if let Err(err) = endpoint.revoke(&site, &token.access_token).await {
                debug!(site_id = %site.site_id, error = %err, "Logout revocation failed (ignored)");
            }
        });
    }
}
