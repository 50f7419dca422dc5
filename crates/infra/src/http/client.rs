//! Shared reqwest wrapper
//!
//! Token grants go through a single-attempt client because retry policy for
//! them belongs to the refresh coordinator. Metadata fetches and
//! connectivity checks may retry server errors with exponential backoff.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use siteauth_domain::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use siteauth_domain::SiteAuthError;
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client with optional retry and a per-request timeout.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Number of attempts `send` makes before giving up
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Execute the request, retrying transport failures and 5xx responses
    /// while attempts remain.
    ///
    /// Returns the raw reqwest error of the last attempt so callers can
    /// classify it for their own error taxonomy.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, reqwest::Error> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        let mut current = builder;

        loop {
            // Forms are buffered, so cloning only fails for streaming bodies
            // which are never retried.
            let next = if attempt < attempts { current.try_clone() } else { None };

            let request = current.build()?;
            let method = request.method().clone();
            let url = redact_query(request.url());
            debug!(attempt, %method, %url, "sending HTTP request");

            let retry = match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %method, %url, %status, "received HTTP response");
                    match next {
                        Some(next) if status.is_server_error() => next,
                        _ => return Ok(response),
                    }
                }
                Err(err) => {
                    debug!(attempt, %method, %url, error = %err, "HTTP request failed");
                    match next {
                        Some(next) if should_retry_error(&err) => next,
                        _ => return Err(err),
                    }
                }
            };

            self.sleep_with_backoff(attempt).await;
            current = retry;
            attempt += 1;
        }
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = u32::try_from(retry_number.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// # Errors
    /// Returns `SiteAuthError::Network` if the TLS backend cannot be
    /// initialised.
    pub fn build(self) -> Result<HttpClient, SiteAuthError> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| SiteAuthError::from(InfraError::from(err)))?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_request() {
        return true;
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return true;
        }
    }
    false
}

/// Strip the query string so authorization parameters never reach logs
fn redact_query(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
