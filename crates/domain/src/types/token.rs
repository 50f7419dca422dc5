//! OAuth 2.0 token records
//!
//! [`TokenRecord`] is the only credential shape that is ever persisted: the
//! access/refresh pair plus expiry metadata. [`TokenResponse`] is the raw
//! authorization-server reply; converting it into a record drops every other
//! field, including any OpenID identity token.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh credential pair for one site
///
/// `issued_at` is stored as epoch seconds; [`TokenRecord::new`] truncates it
/// so that a persisted record reads back equal to the one written.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token presented to the site API
    pub access_token: String,

    /// Opaque token used for the refresh-token grant
    pub refresh_token: String,

    /// When the authorization server issued this pair
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Access token lifetime in seconds; absent means non-expiring/unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenRecord {
    /// Create a record, truncating `issued_at` to whole seconds.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in: Option<u64>,
    ) -> Self {
        let issued_at = DateTime::from_timestamp(issued_at.timestamp(), 0).unwrap_or(issued_at);
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at,
            expires_in,
        }
    }

    /// Absolute expiry, if the server declared a lifetime
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        self.issued_at.checked_add_signed(chrono::Duration::seconds(secs))
    }

    /// Remaining lifetime at `now`; negative once expired
    #[must_use]
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.expires_at().map(|expires_at| expires_at - now)
    }

    /// Remaining lifetime in whole seconds at `now`
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_until_expiry(now).map(|remaining| remaining.num_seconds())
    }

    /// Whether the token is due for proactive renewal
    ///
    /// True once the remaining lifetime is at or below `threshold`, including
    /// already-expired tokens. A token without `expires_in` is never due.
    #[must_use]
    pub fn needs_refresh(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        let Some(remaining) = self.time_until_expiry(now) else {
            return false;
        };
        match chrono::Duration::from_std(threshold) {
            Ok(threshold) => remaining <= threshold,
            Err(_) => true,
        }
    }

    /// Whether the access token is already past its expiry
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now >= expires_at)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token response from an authorization server (RFC 6749 §5.1)
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Build the persisted record, discarding the identity token and scope.
    ///
    /// Servers may omit `refresh_token` on a refresh grant, in which case the
    /// caller's `previous_refresh_token` stays in use.
    ///
    /// # Errors
    /// Returns a description of the missing field when no usable access or
    /// refresh token is present.
    pub fn into_record(
        self,
        issued_at: DateTime<Utc>,
        previous_refresh_token: Option<&str>,
    ) -> Result<TokenRecord, String> {
        if self.access_token.trim().is_empty() {
            return Err("empty access_token".to_string());
        }
        if let Some(token_type) = self.token_type.as_deref() {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(format!("unsupported token_type {token_type}"));
            }
        }

        let refresh_token = match (self.refresh_token, previous_refresh_token) {
            (Some(token), _) if !token.trim().is_empty() => token,
            (_, Some(previous)) => previous.to_string(),
            _ => return Err("missing refresh_token".to_string()),
        };

        Ok(TokenRecord::new(self.access_token, refresh_token, issued_at, self.expires_in))
    }
}
