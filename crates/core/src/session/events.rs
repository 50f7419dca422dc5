//! Outbound session notifications
//!
//! Fan-out over a `tokio::sync::broadcast` channel. Publishing never fails
//! the caller: with no subscribers the event is simply dropped.

use siteauth_domain::constants::SESSION_EVENT_CAPACITY;
use tokio::sync::broadcast;
use tracing::trace;

use super::accessor::TokenAccessor;

/// Lifecycle notification consumed by the UI and API layers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Site activated; API callers read tokens through `accessor`
    SessionReady { site_id: String, accessor: TokenAccessor },
    /// A refresh rotated the credential
    TokenRotated { site_id: String },
    /// Credential is unrecoverable; the user must re-authenticate
    ForceLogout { site_id: String, reason: String },
    /// The user signed out of the site
    LoggedOut { site_id: String },
}

impl SessionEvent {
    #[must_use]
    pub fn site_id(&self) -> &str {
        match self {
            Self::SessionReady { site_id, .. }
            | Self::TokenRotated { site_id }
            | Self::ForceLogout { site_id, .. }
            | Self::LoggedOut { site_id } => site_id,
        }
    }

    /// Stable label for structured logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionReady { .. } => "session_ready",
            Self::TokenRotated { .. } => "token_rotated",
            Self::ForceLogout { .. } => "force_logout",
            Self::LoggedOut { .. } => "logged_out",
        }
    }
}

/// Cloneable publisher handle
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(SESSION_EVENT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            trace!(event = name, "No session event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
