//! Application context - dependency injection container

use std::sync::Arc;

use siteauth_common::security::{KeychainProvider, SecretStore};
use siteauth_common::{Clock, SystemClock};
use siteauth_core::{
    AuthorizationRequest, EventBus, LoginFlow, RefreshCoordinator, RefreshOutcome,
    SessionBootstrapper, SessionEvent, SessionManager, SiteDirectory, TokenAccessor, Trigger,
    TriggerMultiplexer,
};
use siteauth_domain::{Config, Result, SessionStatus, SiteAuthError, SiteRecord};
use siteauth_infra::scheduling::{RefreshScheduler, RefreshSchedulerConfig, SchedulerError};
use siteauth_infra::{
    ConnectivityMonitor, FileSiteDirectory, HttpClient, HttpTokenEndpoint,
    KeychainCredentialStore,
};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const USER_AGENT: &str = concat!("siteauth/", env!("CARGO_PKG_VERSION"));

/// Metadata requests may retry; token grants never do
const METADATA_MAX_ATTEMPTS: usize = 3;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub events: EventBus,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub multiplexer: Arc<TriggerMultiplexer>,
    pub manager: SessionManager,
    pub login: LoginFlow,
    directory: Arc<FileSiteDirectory>,
    reachability_client: HttpClient,
    scheduler: Mutex<RefreshScheduler>,
}

impl AppContext {
    /// Create a context backed by the platform keychain.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Config` for an invalid configuration or if
    /// the HTTP clients cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let keychain = KeychainProvider::new(config.storage.keychain_service.clone());
        Self::with_secret_store(config, Arc::new(keychain))
    }

    /// Create a context over any secret store
    ///
    /// Tests use this with the in-memory keychain to stay off the platform
    /// keychain.
    ///
    /// # Errors
    /// Same as [`AppContext::new`].
    pub fn with_secret_store(config: Config, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        config.validate()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let events = EventBus::new();
        let connectivity = Arc::new(ConnectivityMonitor::new(true));

        let credentials = Arc::new(KeychainCredentialStore::new(secrets));
        let directory = Arc::new(FileSiteDirectory::new(config.storage.site_directory_path.clone()));

        let grants = HttpClient::builder()
            .timeout(config.http.timeout())
            .user_agent(USER_AGENT)
            .build()?;
        let metadata = HttpClient::builder()
            .timeout(config.http.timeout())
            .max_attempts(METADATA_MAX_ATTEMPTS)
            .user_agent(USER_AGENT)
            .build()?;
        let reachability_client = HttpClient::builder()
            .timeout(config.http.timeout())
            .user_agent(USER_AGENT)
            .build()?;
        let endpoint = Arc::new(HttpTokenEndpoint::new(
            grants,
            metadata,
            Arc::clone(&clock),
            config.http.redirect_uri.clone(),
        ));

        let coordinator = Arc::new(RefreshCoordinator::new(
            credentials.clone(),
            directory.clone(),
            endpoint.clone(),
            connectivity.clone(),
            Arc::clone(&clock),
            events.clone(),
            config.session.clone(),
        ));
        let multiplexer =
            Arc::new(TriggerMultiplexer::new(Arc::clone(&coordinator), connectivity.clone()));
        let bootstrapper = SessionBootstrapper::new(
            directory.clone(),
            credentials.clone(),
            endpoint.clone(),
            Arc::clone(&coordinator),
            Arc::clone(&clock),
            events.clone(),
        );
        let manager = SessionManager::new(
            bootstrapper,
            coordinator,
            Arc::clone(&multiplexer),
            directory.clone(),
            credentials.clone(),
            endpoint.clone(),
            events.clone(),
        );
        let login = LoginFlow::new(
            endpoint,
            credentials,
            directory.clone(),
            clock,
            config.http.redirect_uri.clone(),
        );

        let scheduler = RefreshScheduler::new(
            Arc::clone(&multiplexer),
            connectivity.subscribe(),
            RefreshSchedulerConfig::from(&config.session),
        );

        Ok(Self {
            config,
            events,
            connectivity,
            multiplexer,
            manager,
            login,
            directory,
            reachability_client,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Activate the default site, then start the refresh scheduler.
    ///
    /// A failed activation is logged and leaves the app signed out; the
    /// scheduler still starts so a later login is kept fresh.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Internal` if the scheduler is already running.
    pub async fn start(&self) -> Result<Option<TokenAccessor>> {
        let accessor = match self.manager.activate_default().await {
            Ok(Some(accessor)) => {
                info!(site_id = %accessor.site_id(), "Default site activated");
                Some(accessor)
            }
            Ok(None) => {
                info!("No default site; waiting for login");
                None
            }
            Err(err) => {
                warn!(error = %err, "Default site activation failed");
                None
            }
        };

        self.scheduler.lock().await.start().await.map_err(SiteAuthError::from)?;
        Ok(accessor)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Host hook: the application returned to the foreground
    pub fn on_foreground(&self) -> JoinHandle<Option<RefreshOutcome>> {
        self.multiplexer.spawn_fire(Trigger::Foreground)
    }

    /// Host hook: platform reachability changed.
    ///
    /// The scheduler turns an offline to online edge into a reconnect
    /// trigger.
    pub fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
    }

    /// Check the active site's base URL and record the result
    ///
    /// Returns `None` when no site is active.
    pub async fn check_connectivity(&self) -> Option<bool> {
        let site_id = self.manager.active_site()?;
        let site = self.site(&site_id).await?;
        Some(self.connectivity.check_reachability(&self.reachability_client, &site.base_url).await)
    }

    /// Begin an authorization-code login for `site`
    pub fn begin_login(&self, site: SiteRecord) -> AuthorizationRequest {
        self.login.start(site)
    }

    /// Finish a login from the redirect callback and activate the site.
    ///
    /// # Errors
    /// Returns the exchange failure, or the activation failure mapped to
    /// `SiteAuthError`.
    pub async fn complete_login(&self, state: &str, code: &str) -> Result<TokenAccessor> {
        let site = self.login.complete(state, code).await?;
        Ok(self.manager.activate(&site.site_id).await?)
    }

    /// Switch the active session to `site_id`.
    ///
    /// # Errors
    /// Returns the activation failure mapped to `SiteAuthError`.
    pub async fn switch_site(&self, site_id: &str) -> Result<TokenAccessor> {
        Ok(self.manager.activate(site_id).await?)
    }

    /// Sign out of `site_id`.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Storage` if stored state cannot be removed.
    pub async fn logout(&self, site_id: &str) -> Result<()> {
        self.manager.logout(site_id).await
    }

    #[must_use]
    pub fn status(&self) -> Option<SessionStatus> {
        self.manager.active_site().and_then(|site_id| self.manager.status(&site_id))
    }

    pub async fn is_scheduler_running(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }

    /// Stop the scheduler and drop the in-memory session.
    ///
    /// Stored credentials are left in place for the next start. Calling
    /// shutdown twice is harmless.
    ///
    /// # Errors
    /// Returns `SiteAuthError::Internal` if the scheduler loop does not exit
    /// within its join timeout.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        match self.scheduler.lock().await.stop().await {
            Ok(()) | Err(SchedulerError::NotRunning) => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(site_id) = self.manager.active_site() {
            self.manager.deactivate(&site_id);
            info!(site_id = %site_id, "Session released");
        }
        Ok(())
    }

    async fn site(&self, site_id: &str) -> Option<SiteRecord> {
        match self.directory.get(site_id).await {
            Ok(site) => site,
            Err(err) => {
                warn!(site_id = %site_id, error = %err, "Site directory read failed");
                None
            }
        }
    }
}
