//! Authorization-code login flow

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use siteauth_common::auth::pkce::PkceChallenge;
use siteauth_common::time::Clock;
use siteauth_domain::constants::AUTHORIZE_PATH;
use siteauth_domain::{ExchangeError, SiteRecord, SiteRecordPatch};
use tracing::{debug, info, warn};

use crate::session::ports::{CredentialStore, SiteDirectory, TokenEndpoint};

/// Pending logins older than this are discarded
const PENDING_LOGIN_TTL_SECS: i64 = 600;

/// URL to open in the browser plus the state that identifies the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub site_id: String,
    pub url: String,
    pub state: String,
}

struct PendingLogin {
    site: SiteRecord,
    verifier: String,
    started_at: DateTime<Utc>,
}

/// Starts and completes logins. A site is only written to the directory
/// once its code exchange succeeds; abandoned logins leave no trace.
pub struct LoginFlow {
    endpoint: Arc<dyn TokenEndpoint>,
    credentials: Arc<dyn CredentialStore>,
    directory: Arc<dyn SiteDirectory>,
    clock: Arc<dyn Clock>,
    redirect_uri: String,
    pending: Mutex<HashMap<String, PendingLogin>>,
}

impl LoginFlow {
    pub fn new(
        endpoint: Arc<dyn TokenEndpoint>,
        credentials: Arc<dyn CredentialStore>,
        directory: Arc<dyn SiteDirectory>,
        clock: Arc<dyn Clock>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            directory,
            clock,
            redirect_uri: redirect_uri.into(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a login for `site` and build its authorization URL.
    pub fn start(&self, site: SiteRecord) -> AuthorizationRequest {
        let challenge = PkceChallenge::generate();
        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&code_challenge={}&code_challenge_method={}&state={}",
            site.endpoint(AUTHORIZE_PATH),
            urlencoding::encode(&site.oauth_client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&challenge.code_challenge),
            challenge.challenge_method(),
            urlencoding::encode(&challenge.state),
        );

        let now = self.clock.now();
        let site_id = site.site_id.clone();
        let mut pending = self.pending.lock();
        pending.retain(|_, login| (now - login.started_at).num_seconds() < PENDING_LOGIN_TTL_SECS);
        pending.insert(
            challenge.state.clone(),
            PendingLogin { site, verifier: challenge.code_verifier, started_at: now },
        );

        debug!(site_id = %site_id, "Authorization request created");
        AuthorizationRequest { site_id, url, state: challenge.state }
    }

    /// Abandon a pending login
    pub fn cancel(&self, state: &str) {
        self.pending.lock().remove(state);
    }

    /// Number of logins waiting for a callback
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Finish the login identified by `state` with the returned `code`.
    ///
    /// Upserts the site record, persists the seed token record and makes the
    /// site the default when none is set. A token is never stored without
    /// its site record; a site first seen here is removed again if the token
    /// cannot be stored.
    ///
    /// # Errors
    /// `StateMismatch` for unknown or expired state, the endpoint's exchange
    /// failure, or `Storage` if the result cannot be persisted.
    pub async fn complete(&self, state: &str, code: &str) -> Result<SiteRecord, ExchangeError> {
        let login = self.pending.lock().remove(state).ok_or(ExchangeError::StateMismatch)?;
        if (self.clock.now() - login.started_at).num_seconds() >= PENDING_LOGIN_TTL_SECS {
            return Err(ExchangeError::StateMismatch);
        }

        let site_id = login.site.site_id.clone();
        let token = self.endpoint.exchange_code(&login.site, code, &login.verifier).await?;

        let known = self.directory.get(&site_id).await?.is_some();
        let site = self.directory.upsert(&site_id, SiteRecordPatch::from(login.site)).await?;
        if let Err(err) = self.credentials.put(&site_id, &token).await {
            warn!(site_id = %site_id, error = %err, "Failed to store login token");
            if !known {
                if let Err(err) = self.directory.remove(&site_id).await {
                    warn!(site_id = %site_id, error = %err, "Failed to remove site after failed login");
                }
            }
            return Err(err.into());
        }
        if self.directory.get_default().await?.is_none() {
            self.directory.set_default(&site_id).await?;
        }

        info!(site_id = %site_id, "Login completed");
        Ok(site)
    }
}
