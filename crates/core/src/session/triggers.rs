//! Trigger multiplexer
//!
//! Normalizes every wake-up source into one `consider_refresh` call for the
//! active site. The decision whether to refresh lives only in the
//! coordinator; this layer just drops triggers that cannot possibly help.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::coordinator::{RefreshCoordinator, RefreshOutcome};
use super::ports::Connectivity;

/// Payload-free wake-up signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Periodic timer tick
    PeriodicTick,
    /// Application moved from background to foreground
    Foreground,
    /// Network went from offline to online
    Reconnected,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PeriodicTick => "periodic_tick",
            Self::Foreground => "foreground",
            Self::Reconnected => "reconnected",
        }
    }

    /// Foreground still reaches the coordinator while offline: connectivity
    /// state may be stale after the app was suspended.
    const fn bypasses_offline_check(self) -> bool {
        matches!(self, Self::Foreground)
    }
}

/// Routes triggers to the refresh coordinator for the active site
pub struct TriggerMultiplexer {
    coordinator: Arc<RefreshCoordinator>,
    connectivity: Arc<dyn Connectivity>,
    active_site: RwLock<Option<String>>,
}

impl TriggerMultiplexer {
    pub fn new(coordinator: Arc<RefreshCoordinator>, connectivity: Arc<dyn Connectivity>) -> Self {
        Self { coordinator, connectivity, active_site: RwLock::new(None) }
    }

    pub fn set_active_site(&self, site_id: impl Into<String>) {
        *self.active_site.write() = Some(site_id.into());
    }

    /// Clear the active site, but only if it is still `site_id`
    pub fn clear_active_site(&self, site_id: &str) {
        let mut active = self.active_site.write();
        if active.as_deref() == Some(site_id) {
            *active = None;
        }
    }

    #[must_use]
    pub fn active_site(&self) -> Option<String> {
        self.active_site.read().clone()
    }

    /// Forward `trigger` to the coordinator.
    ///
    /// Returns `None` when the trigger was suppressed before reaching it
    /// (no active site, or offline for a non-foreground trigger). A forced
    /// logout clears the active site.
    pub async fn fire(&self, trigger: Trigger) -> Option<RefreshOutcome> {
        let Some(site_id) = self.active_site() else {
            debug!(trigger = trigger.as_str(), "Trigger ignored: no active site");
            return None;
        };

        if !trigger.bypasses_offline_check() && !self.connectivity.is_online() {
            debug!(site_id = %site_id, trigger = trigger.as_str(), "Trigger suppressed while offline");
            return None;
        }

        debug!(site_id = %site_id, trigger = trigger.as_str(), "Trigger forwarded");
        let outcome = self.coordinator.consider_refresh(&site_id).await;
        if matches!(outcome, RefreshOutcome::ForcedLogout { .. }) {
            self.clear_active_site(&site_id);
        }
        Some(outcome)
    }

    /// Fire `trigger` on a background task so slow refreshes never block the
    /// caller's event loop.
    pub fn spawn_fire(self: &Arc<Self>, trigger: Trigger) -> tokio::task::JoinHandle<Option<RefreshOutcome>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.fire(trigger).await })
    }
}
