//! OAuth2 token endpoint client
//!
//! Speaks the refresh-token grant, the authorization-code grant with a PKCE
//! verifier, RFC 7009 revocation and the site's server settings document.
//! All endpoints are derived from the site's `base_url`.
//!
//! Response classification for token grants:
//!
//! | Response                         | Result               |
//! |----------------------------------|----------------------|
//! | 2xx with a valid token body      | `Ok(TokenRecord)`    |
//! | 2xx with an unusable body        | `Malformed`          |
//! | 408, 429, 5xx, transport failure | `NetworkUnavailable` |
//! | any other 4xx                    | `Rejected`           |

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use siteauth_common::time::Clock;
use siteauth_core::TokenEndpoint;
use siteauth_domain::constants::{REVOKE_PATH, SERVER_SETTINGS_PATH, TOKEN_PATH};
use siteauth_domain::{
    ExchangeError, RefreshError, Result, RevokeError, SiteAuthError, SiteRecord, SiteRecordPatch,
    TokenRecord, TokenResponse,
};
use tracing::{debug, instrument, warn};

use super::client::HttpClient;
use crate::errors::{refresh_transport_error, InfraError};

/// OAuth error body (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Subset of the server settings document used for site display metadata
#[derive(Debug, Deserialize)]
struct ServerSettings {
    #[serde(default)]
    site_name: Option<String>,
    #[serde(default)]
    logo_url: Option<String>,
    #[serde(default)]
    version_tags: Option<Vec<String>>,
    #[serde(default)]
    timezone: Option<String>,
}

impl From<ServerSettings> for SiteRecordPatch {
    fn from(settings: ServerSettings) -> Self {
        Self {
            display_name: settings.site_name.filter(|name| !name.trim().is_empty()),
            logo_ref: settings.logo_url,
            server_version_tags: settings.version_tags,
            timezone: settings.timezone,
            ..Self::default()
        }
    }
}

/// How a non-success token response should be treated
enum Failure {
    Transient(String),
    Rejected(String),
}

/// HTTP implementation of the [`TokenEndpoint`] port
pub struct HttpTokenEndpoint {
    grants: HttpClient,
    metadata: HttpClient,
    clock: Arc<dyn Clock>,
    redirect_uri: String,
}

impl HttpTokenEndpoint {
    /// `grants` is used for token and revocation requests and should make a
    /// single attempt; `metadata` may retry.
    pub fn new(
        grants: HttpClient,
        metadata: HttpClient,
        clock: Arc<dyn Clock>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self { grants, metadata, clock, redirect_uri: redirect_uri.into() }
    }

    async fn post_form(
        &self,
        url: String,
        form: &[(&str, &str)],
    ) -> std::result::Result<Response, reqwest::Error> {
        let request = self
            .grants
            .request(Method::POST, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form);
        self.grants.send(request).await
    }

    /// Read a 2xx token response into a record
    async fn read_token(
        &self,
        response: Response,
        previous_refresh_token: Option<&str>,
    ) -> std::result::Result<TokenRecord, String> {
        let body: TokenResponse =
            response.json().await.map_err(|err| format!("invalid token response: {err}"))?;
        body.into_record(self.clock.now(), previous_refresh_token)
    }
}

/// Classify a non-2xx token endpoint response
async fn classify_failure(response: Response) -> Failure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<OAuthErrorBody>(&body).map_or_else(
        |_| format!("HTTP {}", status.as_u16()),
        |err| match err.error_description {
            Some(description) => format!("{}: {description}", err.error),
            None => err.error,
        },
    );

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Failure::Transient(detail)
    } else {
        Failure::Rejected(detail)
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    #[instrument(skip_all, fields(site_id = %site.site_id))]
    async fn refresh(
        &self,
        site: &SiteRecord,
        refresh_token: &str,
    ) -> std::result::Result<TokenRecord, RefreshError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", site.oauth_client_id.as_str()),
        ];
        let response =
            self.post_form(site.endpoint(TOKEN_PATH), &form).await.map_err(refresh_transport_error)?;

        if response.status().is_success() {
            return self
                .read_token(response, Some(refresh_token))
                .await
                .map_err(RefreshError::Malformed);
        }

        match classify_failure(response).await {
            Failure::Transient(detail) => {
                debug!(detail = %detail, "Refresh failed transiently");
                Err(RefreshError::NetworkUnavailable(detail))
            }
            Failure::Rejected(detail) => {
                warn!(detail = %detail, "Refresh token rejected");
                Err(RefreshError::Rejected(detail))
            }
        }
    }

    #[instrument(skip_all, fields(site_id = %site.site_id))]
    async fn revoke(
        &self,
        site: &SiteRecord,
        access_token: &str,
    ) -> std::result::Result<(), RevokeError> {
        let form = [
            ("token", access_token),
            ("token_type_hint", "access_token"),
            ("client_id", site.oauth_client_id.as_str()),
        ];
        let response = self
            .post_form(site.endpoint(REVOKE_PATH), &form)
            .await
            .map_err(|err| RevokeError::Network(InfraError::from(err).0.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Access token revoked");
            Ok(())
        } else {
            Err(RevokeError::Status(status.as_u16()))
        }
    }

    #[instrument(skip_all, fields(site_id = %site.site_id))]
    async fn exchange_code(
        &self,
        site: &SiteRecord,
        code: &str,
        verifier: &str,
    ) -> std::result::Result<TokenRecord, ExchangeError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", site.oauth_client_id.as_str()),
            ("code_verifier", verifier),
        ];
        let response = self.post_form(site.endpoint(TOKEN_PATH), &form).await.map_err(|err| {
            match refresh_transport_error(err) {
                RefreshError::Malformed(detail) => ExchangeError::Malformed(detail),
                other => ExchangeError::NetworkUnavailable(other.reason()),
            }
        })?;

        if response.status().is_success() {
            return self.read_token(response, None).await.map_err(ExchangeError::Malformed);
        }

        match classify_failure(response).await {
            Failure::Transient(detail) => Err(ExchangeError::NetworkUnavailable(detail)),
            Failure::Rejected(detail) => Err(ExchangeError::Rejected(detail)),
        }
    }

    #[instrument(skip_all, fields(site_id = %site.site_id))]
    async fn fetch_site_metadata(&self, site: &SiteRecord) -> Result<SiteRecordPatch> {
        let request = self
            .metadata
            .request(Method::GET, site.endpoint(SERVER_SETTINGS_PATH))
            .header(reqwest::header::ACCEPT, "application/json");

        let response = self
            .metadata
            .send(request)
            .await
            .and_then(Response::error_for_status)
            .map_err(|err| SiteAuthError::from(InfraError::from(err)))?;

        let settings: ServerSettings =
            response.json().await.map_err(|err| SiteAuthError::from(InfraError::from(err)))?;
        Ok(settings.into())
    }
}
