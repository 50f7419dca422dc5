//! Per-site refresh lifecycle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Refresh state of one site session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RefreshState {
    /// No refresh outstanding
    Idle,
    /// Exactly one refresh call is in flight
    Refreshing { started_at: DateTime<Utc> },
    /// Credential was rejected; no automatic attempts before `until`
    Cooldown { until: DateTime<Utc> },
}

impl RefreshState {
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        matches!(self, Self::Refreshing { .. })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refreshing { .. } => "refreshing",
            Self::Cooldown { .. } => "cooldown",
        }
    }
}

/// Diagnostic snapshot of a site session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub site_id: String,
    pub state: RefreshState,
    /// `None` when the token has no declared lifetime or was discarded
    pub seconds_until_expiry: Option<i64>,
    pub has_token: bool,
    pub last_refresh_attempt_at: Option<DateTime<Utc>>,
}
