//! Session bootstrapper - one-shot activation of a site
//!
//! Linear sequence, no retries of its own:
//! 0. wait out any refresh still in flight for the site, so the store holds
//!    the latest record
//! 1. load the site record (missing -> `SiteNotFound`)
//! 2. load the stored credential (missing -> `NoCredential`)
//! 3. refresh synchronously if the token is due, joining a refresh another
//!    trigger started instead of issuing a second one; a rejection aborts,
//!    a transient failure proceeds with the old token
//! 4. install the token and announce `SessionReady`
//! 5. re-fetch site metadata in the background, ignoring failures

use std::sync::Arc;

use siteauth_common::time::Clock;
use siteauth_domain::{BootstrapError, SiteRecord};
use tracing::{debug, info, warn};

use super::accessor::TokenAccessor;
use super::coordinator::{RefreshCoordinator, RefreshOutcome};
use super::machine::SkipReason;
use super::events::{EventBus, SessionEvent};
use super::ports::{CredentialStore, SiteDirectory, TokenEndpoint};

pub struct SessionBootstrapper {
    directory: Arc<dyn SiteDirectory>,
    credentials: Arc<dyn CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    coordinator: Arc<RefreshCoordinator>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SessionBootstrapper {
    pub fn new(
        directory: Arc<dyn SiteDirectory>,
        credentials: Arc<dyn CredentialStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        coordinator: Arc<RefreshCoordinator>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self { directory, credentials, endpoint, coordinator, clock, events }
    }

    /// Activate `site_id` and return the accessor API callers should use.
    ///
    /// # Errors
    /// Every error means the user must re-authenticate: `SiteNotFound`,
    /// `NoCredential`, `Rejected`, or `Storage` when durable state cannot be
    /// read at all.
    pub async fn activate(&self, site_id: &str) -> Result<TokenAccessor, BootstrapError> {
        if let Some(outcome) = self.coordinator.join_in_flight(site_id).await {
            debug!(site_id = %site_id, ?outcome, "Outstanding refresh settled before activation");
        }

        let Some(site) = self.directory.get(site_id).await? else {
            warn!(site_id = %site_id, "Site not found in directory");
            self.clear_default_if(site_id).await;
            return Err(BootstrapError::SiteNotFound(site_id.to_string()));
        };

        let seen = self.coordinator.rotations(site_id);
        let Some(token) = self.credentials.get(site_id).await? else {
            warn!(site_id = %site_id, "No stored credential for site");
            self.clear_default_if(site_id).await;
            return Err(BootstrapError::NoCredential(site_id.to_string()));
        };

        let accessor = self.coordinator.install_loaded(site.clone(), token, seen);
        let threshold = self.coordinator.config().refresh_threshold();
        let due = accessor.current().is_some_and(|token| token.needs_refresh(threshold, self.clock.now()));

        if due {
            debug!(site_id = %site_id, "Stored token due for refresh; refreshing before ready");
            let outcome = match self.coordinator.consider_refresh(site_id).await {
                RefreshOutcome::Skipped(SkipReason::InFlight) => self
                    .coordinator
                    .join_in_flight(site_id)
                    .await
                    .unwrap_or(RefreshOutcome::Skipped(SkipReason::InFlight)),
                outcome => outcome,
            };
            match outcome {
                RefreshOutcome::ForcedLogout { reason } => {
                    self.coordinator.deactivate(site_id);
                    return Err(BootstrapError::Rejected { site_id: site_id.to_string(), reason });
                }
                RefreshOutcome::Skipped(SkipReason::CoolingDown) => {
                    self.coordinator.deactivate(site_id);
                    return Err(BootstrapError::Rejected {
                        site_id: site_id.to_string(),
                        reason: "credential rejected recently".into(),
                    });
                }
                outcome => debug!(site_id = %site_id, ?outcome, "Activation refresh settled"),
            }
        }

        info!(site_id = %site_id, "Session ready");
        self.events.publish(SessionEvent::SessionReady {
            site_id: site_id.to_string(),
            accessor: accessor.clone(),
        });

        self.spawn_metadata_refresh(site);
        Ok(accessor)
    }

    async fn clear_default_if(&self, site_id: &str) {
        match self.directory.get_default().await {
            Ok(Some(default)) if default == site_id => {
                if let Err(err) = self.directory.clear_default().await {
                    warn!(site_id = %site_id, error = %err, "Failed to clear default site");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(site_id = %site_id, error = %err, "Failed to read default site"),
        }
    }

    fn spawn_metadata_refresh(&self, site: SiteRecord) {
        let endpoint = Arc::clone(&self.endpoint);
        let directory = Arc::clone(&self.directory);
        let coordinator = Arc::clone(&self.coordinator);

        tokio::spawn(async move {
            let patch = match endpoint.fetch_site_metadata(&site).await {
                Ok(patch) if !patch.is_empty() => patch,
                Ok(_) => return,
                Err(err) => {
                    debug!(site_id = %site.site_id, error = %err, "Site metadata refresh failed (ignored)");
                    return;
                }
            };
            match directory.upsert(&site.site_id, patch).await {
                Ok(merged) => coordinator.update_site(merged),
                Err(err) => {
                    debug!(site_id = %site.site_id, error = %err, "Site metadata upsert failed (ignored)");
                }
            }
        });
    }
}
