//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use siteauth_common::security::KeychainError;
use siteauth_domain::{RefreshError, SiteAuthError, StorageError};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SiteAuthError);

impl From<InfraError> for SiteAuthError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SiteAuthError> for InfraError {
    fn from(value: SiteAuthError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoSiteAuthError {
    fn into_siteauth(self) -> SiteAuthError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → SiteAuthError */
/* -------------------------------------------------------------------------- */

impl IntoSiteAuthError for KeyringError {
    fn into_siteauth(self) -> SiteAuthError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => SiteAuthError::NotFound("keychain entry not found".into()),
            BadEncoding(_) => {
                SiteAuthError::Storage("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => SiteAuthError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                SiteAuthError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            PlatformFailure(err) => {
                SiteAuthError::Platform(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                SiteAuthError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => SiteAuthError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_siteauth())
    }
}

/// Map a keychain failure onto the credential store taxonomy.
///
/// Undecodable stored data is `Corrupt`; everything else means the store is
/// unreachable right now.
#[must_use]
pub fn keychain_storage_error(err: KeychainError) -> StorageError {
    match err {
        KeychainError::Serialization(err) => StorageError::Corrupt(err.to_string()),
        KeychainError::Keyring(KeyringError::BadEncoding(_)) => {
            StorageError::Corrupt("credential in keychain is not valid UTF-8".into())
        }
        KeychainError::Keyring(err) => match InfraError::from(err).0 {
            SiteAuthError::Storage(msg) | SiteAuthError::Platform(msg) => {
                StorageError::Unavailable(msg)
            }
            other => StorageError::Unavailable(other.to_string()),
        },
        KeychainError::NotFound => StorageError::Unavailable("keychain entry not found".into()),
        KeychainError::AccessFailed(msg) => StorageError::Unavailable(msg),
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SiteAuthError */
/* -------------------------------------------------------------------------- */

impl IntoSiteAuthError for HttpError {
    fn into_siteauth(self) -> SiteAuthError {
        if self.is_timeout() {
            return SiteAuthError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return SiteAuthError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => SiteAuthError::Auth(message),
                404 => SiteAuthError::NotFound(message),
                408 | 429 => SiteAuthError::Network(message),
                400..=499 => SiteAuthError::InvalidInput(message),
                _ => SiteAuthError::Network(message),
            };
        }

        if self.is_decode() {
            return SiteAuthError::InvalidInput(format!("undecodable response body: {self}"));
        }

        SiteAuthError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_siteauth())
    }
}

/// Classify a transport-level failure of a refresh request.
///
/// Only failures that never produced a usable response reach here, so
/// everything but an undecodable body is transient.
#[must_use]
pub fn refresh_transport_error(err: HttpError) -> RefreshError {
    match InfraError::from(err).0 {
        SiteAuthError::InvalidInput(msg) => RefreshError::Malformed(msg),
        other => RefreshError::NetworkUnavailable(other.to_string()),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
