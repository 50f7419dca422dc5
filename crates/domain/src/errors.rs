//! Error types used throughout the application
//!
//! [`SiteAuthError`] is the umbrella error crossing crate boundaries. The
//! narrower enums below form the session failure taxonomy: each one maps to
//! a distinct recovery policy in the refresh lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for SiteAuth
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SiteAuthError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for SiteAuth operations
pub type Result<T> = std::result::Result<T, SiteAuthError>;

/// Failure reading or writing durable session state.
///
/// A failed write never leaves a partial record behind; callers keep the
/// previously stored value as authoritative.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backing store could not be reached (keychain locked, I/O failure).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value exists but cannot be decoded.
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    /// Operation referenced a site the directory does not know.
    #[error("unknown site: {0}")]
    UnknownSite(String),

    /// A new site record is missing fields required to reach the site.
    #[error("incomplete site record for {site_id}: missing {field}")]
    Incomplete { site_id: String, field: &'static str },
}

/// Outcome taxonomy of a refresh-token grant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Transient: unreachable host, timeout or server-side outage.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The authorization server explicitly invalidated the credential.
    #[error("refresh rejected: {0}")]
    Rejected(String),

    /// The server answered with something that is not a token response.
    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl RefreshError {
    /// Whether this failure invalidates the session for good.
    #[must_use]
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Malformed(_))
    }

    /// Human readable reason carried into a force-logout notification.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::NetworkUnavailable(detail) | Self::Rejected(detail) | Self::Malformed(detail) => {
                detail.clone()
            }
        }
    }
}

/// Token revocation failure. Always non-fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevokeError {
    #[error("revocation request failed: {0}")]
    Network(String),

    #[error("revocation endpoint returned HTTP {0}")]
    Status(u16),
}

/// Authorization-code exchange failure during login.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("code exchange rejected: {0}")]
    Rejected(String),

    #[error("malformed token response: {0}")]
    Malformed(String),

    /// Callback state does not match any pending login.
    #[error("state parameter mismatch")]
    StateMismatch,

    #[error("PKCE generation failed: {0}")]
    Pkce(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure activating a site session. Each variant routes the user back to
/// re-authentication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("site not found: {0}")]
    SiteNotFound(String),

    #[error("no stored credential for site {0}")]
    NoCredential(String),

    #[error("credential for site {site_id} was rejected: {reason}")]
    Rejected { site_id: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<StorageError> for SiteAuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnknownSite(site_id) => Self::NotFound(format!("site {site_id}")),
            StorageError::Incomplete { .. } => Self::InvalidInput(err.to_string()),
            StorageError::Unavailable(_) | StorageError::Corrupt(_) => {
                Self::Storage(err.to_string())
            }
        }
    }
}

impl From<RefreshError> for SiteAuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NetworkUnavailable(_) => Self::Network(err.to_string()),
            RefreshError::Rejected(_) | RefreshError::Malformed(_) => Self::Auth(err.to_string()),
        }
    }
}

impl From<ExchangeError> for SiteAuthError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::NetworkUnavailable(_) => Self::Network(err.to_string()),
            ExchangeError::Storage(inner) => inner.into(),
            ExchangeError::Pkce(_) => Self::Internal(err.to_string()),
            _ => Self::Auth(err.to_string()),
        }
    }
}

impl From<BootstrapError> for SiteAuthError {
    fn from(err: BootstrapError) -> Self {
        match err {
            BootstrapError::SiteNotFound(_) => Self::NotFound(err.to_string()),
            BootstrapError::Storage(inner) => inner.into(),
            _ => Self::Auth(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for errors.
    use super::*;

    /// Validates the refresh failure taxonomy split between transient and
    /// unrecoverable outcomes.
    ///
    /// Assertions:
    /// - Ensures `NetworkUnavailable` is recoverable.
    /// - Ensures `Rejected` and `Malformed` are unrecoverable.
    #[test]
    fn test_refresh_error_recoverability() {
        assert!(!RefreshError::NetworkUnavailable("timeout".into()).is_unrecoverable());
        assert!(RefreshError::Rejected("invalid_grant".into()).is_unrecoverable());
        assert!(RefreshError::Malformed("missing access_token".into()).is_unrecoverable());
    }

    /// Validates conversion of narrow errors into the umbrella error.
    ///
    /// Assertions:
    /// - Confirms unknown sites map to `NotFound`.
    /// - Confirms rejected refreshes map to `Auth`.
    /// - Confirms storage failures nested in exchange errors map to `Storage`.
    #[test]
    fn test_umbrella_conversions() {
        let err: SiteAuthError = StorageError::UnknownSite("alpha".into()).into();
        assert_eq!(err, SiteAuthError::NotFound("site alpha".into()));

        let err: SiteAuthError = RefreshError::Rejected("invalid_grant".into()).into();
        assert!(matches!(err, SiteAuthError::Auth(_)));

        let err: SiteAuthError =
            ExchangeError::Storage(StorageError::Unavailable("locked".into())).into();
        assert!(matches!(err, SiteAuthError::Storage(_)));
    }

    /// Validates the serde tagging used when errors cross process boundaries.
    ///
    /// Assertions:
    /// - Confirms the serialized JSON uses `type`/`message` tagging.
    #[test]
    fn test_site_auth_error_serde_tagging() {
        let json = serde_json::to_string(&SiteAuthError::Config("bad".into())).unwrap();
        assert_eq!(json, r#"{"type":"Config","message":"bad"}"#);
    }
}
