//! In-memory port implementations shared by the core integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use siteauth_common::testing::MockClock;
use siteauth_core::{
    Connectivity, CredentialStore, EventBus, RefreshCoordinator, SessionBootstrapper,
    SessionManager, SiteDirectory, TokenEndpoint, TriggerMultiplexer,
};
use siteauth_domain::{
    ExchangeError, RefreshError, Result, RevokeError, SessionConfig, SiteAuthError, SiteRecord,
    SiteRecordPatch, StorageError, TokenRecord,
};
use tokio::sync::Notify;

/// Ordered record of every side effect the fakes observe
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct MemoryCredentialStore {
    records: Mutex<HashMap<String, TokenRecord>>,
    fail_puts: AtomicBool,
    log: CallLog,
}

impl MemoryCredentialStore {
    pub fn new(log: CallLog) -> Self {
        Self { records: Mutex::new(HashMap::new()), fail_puts: AtomicBool::new(false), log }
    }

    pub fn seed(&self, site_id: &str, record: TokenRecord) {
        self.records.lock().insert(site_id.to_string(), record);
    }

    pub fn stored(&self, site_id: &str) -> Option<TokenRecord> {
        self.records.lock().get(site_id).cloned()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, site_id: &str, record: &TokenRecord) -> std::result::Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("keychain locked".into()));
        }
        self.log.push(format!("put:{site_id}:{}", record.access_token));
        self.records.lock().insert(site_id.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, site_id: &str) -> std::result::Result<Option<TokenRecord>, StorageError> {
        Ok(self.stored(site_id))
    }

    async fn delete(&self, site_id: &str) -> std::result::Result<(), StorageError> {
        self.log.push(format!("delete:{site_id}"));
        self.records.lock().remove(site_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySiteDirectory {
    sites: Mutex<BTreeMap<String, SiteRecord>>,
    default_site: Mutex<Option<String>>,
    fail_upserts: AtomicBool,
}

impl MemorySiteDirectory {
    pub fn seed(&self, site: SiteRecord) {
        self.sites.lock().insert(site.site_id.clone(), site);
    }

    pub fn default_site(&self) -> Option<String> {
        self.default_site.lock().clone()
    }

    /// Set the default pointer without checking that the site exists
    pub fn point_default_at(&self, site_id: &str) {
        *self.default_site.lock() = Some(site_id.to_string());
    }

    pub fn site(&self, site_id: &str) -> Option<SiteRecord> {
        self.sites.lock().get(site_id).cloned()
    }

    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SiteDirectory for MemorySiteDirectory {
    async fn list(&self) -> std::result::Result<BTreeMap<String, SiteRecord>, StorageError> {
        Ok(self.sites.lock().clone())
    }

    async fn get(&self, site_id: &str) -> std::result::Result<Option<SiteRecord>, StorageError> {
        Ok(self.site(site_id))
    }

    async fn upsert(
        &self,
        site_id: &str,
        patch: SiteRecordPatch,
    ) -> std::result::Result<SiteRecord, StorageError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".into()));
        }
        let mut sites = self.sites.lock();
        let merged = match sites.get(site_id).cloned() {
            Some(mut existing) => {
                existing.merge(patch);
                existing
            }
            None => patch.into_record(site_id)?,
        };
        sites.insert(site_id.to_string(), merged.clone());
        Ok(merged)
    }

    async fn remove(&self, site_id: &str) -> std::result::Result<(), StorageError> {
        self.sites.lock().remove(site_id);
        let mut default_site = self.default_site.lock();
        if default_site.as_deref() == Some(site_id) {
            *default_site = None;
        }
        Ok(())
    }

    async fn get_default(&self) -> std::result::Result<Option<String>, StorageError> {
        Ok(self.default_site())
    }

    async fn set_default(&self, site_id: &str) -> std::result::Result<(), StorageError> {
        if !self.sites.lock().contains_key(site_id) {
            return Err(StorageError::UnknownSite(site_id.to_string()));
        }
        *self.default_site.lock() = Some(site_id.to_string());
        Ok(())
    }

    async fn clear_default(&self) -> std::result::Result<(), StorageError> {
        *self.default_site.lock() = None;
        Ok(())
    }
}

/// Token endpoint answering from queued responses.
///
/// With `hold_refreshes` set, every refresh call parks until `release` is
/// called, which lets tests observe a refresh while it is in flight.
pub struct ScriptedEndpoint {
    refresh_responses: Mutex<VecDeque<std::result::Result<TokenRecord, RefreshError>>>,
    exchange_responses: Mutex<VecDeque<std::result::Result<TokenRecord, ExchangeError>>>,
    metadata: Mutex<Option<SiteRecordPatch>>,
    refresh_delay: Mutex<Option<Duration>>,
    hold: AtomicBool,
    gate: Notify,
    entered: Notify,
    refresh_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    log: CallLog,
}

impl ScriptedEndpoint {
    pub fn new(log: CallLog) -> Self {
        Self {
            refresh_responses: Mutex::new(VecDeque::new()),
            exchange_responses: Mutex::new(VecDeque::new()),
            metadata: Mutex::new(None),
            refresh_delay: Mutex::new(None),
            hold: AtomicBool::new(false),
            gate: Notify::new(),
            entered: Notify::new(),
            refresh_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            log,
        }
    }

    pub fn push_refresh(&self, response: std::result::Result<TokenRecord, RefreshError>) {
        self.refresh_responses.lock().push_back(response);
    }

    pub fn push_exchange(&self, response: std::result::Result<TokenRecord, ExchangeError>) {
        self.exchange_responses.lock().push_back(response);
    }

    pub fn set_metadata(&self, patch: SiteRecordPatch) {
        *self.metadata.lock() = Some(patch);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    pub fn hold_refreshes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Wait until a refresh call has reached the endpoint
    pub async fn refresh_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedEndpoint {
    async fn refresh(
        &self,
        site: &SiteRecord,
        _refresh_token: &str,
    ) -> std::result::Result<TokenRecord, RefreshError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("refresh:{}", site.site_id));

        if self.hold.load(Ordering::SeqCst) {
            let released = self.gate.notified();
            self.entered.notify_one();
            released.await;
        }
        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.refresh_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshError::NetworkUnavailable("no scripted response".into())))
    }

    async fn revoke(&self, _site: &SiteRecord, access_token: &str) -> std::result::Result<(), RevokeError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("revoke:{access_token}"));
        Err(RevokeError::Status(503))
    }

    async fn exchange_code(
        &self,
        _site: &SiteRecord,
        code: &str,
        verifier: &str,
    ) -> std::result::Result<TokenRecord, ExchangeError> {
        self.log.push(format!("exchange:{code}:{}", verifier.len()));
        self.exchange_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ExchangeError::NetworkUnavailable("no scripted response".into())))
    }

    async fn fetch_site_metadata(&self, _site: &SiteRecord) -> Result<SiteRecordPatch> {
        self.metadata
            .lock()
            .clone()
            .ok_or_else(|| SiteAuthError::Network("metadata unavailable".into()))
    }
}

pub struct StaticConnectivity(AtomicBool);

impl StaticConnectivity {
    pub fn online() -> Self {
        Self(AtomicBool::new(true))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub const SITE: &str = "acme";

pub fn site(site_id: &str) -> SiteRecord {
    SiteRecord::new(site_id, format!("https://{site_id}.example.com"), "desktop-client")
}

/// Threshold 720s, check interval 300s, timeout 30s, cooldown 300s
pub fn session_config() -> SessionConfig {
    SessionConfig::default()
}

/// Fully wired core graph over the in-memory fakes
pub struct Harness {
    pub log: CallLog,
    pub clock: MockClock,
    pub credentials: Arc<MemoryCredentialStore>,
    pub directory: Arc<MemorySiteDirectory>,
    pub endpoint: Arc<ScriptedEndpoint>,
    pub connectivity: Arc<StaticConnectivity>,
    pub events: EventBus,
    pub coordinator: Arc<RefreshCoordinator>,
    pub multiplexer: Arc<TriggerMultiplexer>,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(session_config())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let log = CallLog::default();
        let clock = MockClock::new();
        let credentials = Arc::new(MemoryCredentialStore::new(log.clone()));
        let directory = Arc::new(MemorySiteDirectory::default());
        let endpoint = Arc::new(ScriptedEndpoint::new(log.clone()));
        let connectivity = Arc::new(StaticConnectivity::online());
        let events = EventBus::new();

        let coordinator = Arc::new(RefreshCoordinator::new(
            credentials.clone(),
            directory.clone(),
            endpoint.clone(),
            connectivity.clone(),
            Arc::new(clock.clone()),
            events.clone(),
            config,
        ));
        let multiplexer = Arc::new(TriggerMultiplexer::new(coordinator.clone(), connectivity.clone()));
        let bootstrapper = SessionBootstrapper::new(
            directory.clone(),
            credentials.clone(),
            endpoint.clone(),
            coordinator.clone(),
            Arc::new(clock.clone()),
            events.clone(),
        );
        let manager = SessionManager::new(
            bootstrapper,
            coordinator.clone(),
            multiplexer.clone(),
            directory.clone(),
            credentials.clone(),
            endpoint.clone(),
            events.clone(),
        );

        Self {
            log,
            clock,
            credentials,
            directory,
            endpoint,
            connectivity,
            events,
            coordinator,
            multiplexer,
            manager,
        }
    }

    /// Token issued now by the mock clock
    pub fn token(&self, access: &str, expires_in: Option<u64>) -> TokenRecord {
        TokenRecord::new(access, format!("{access}-refresh"), self.clock_now(), expires_in)
    }

    pub fn clock_now(&self) -> chrono::DateTime<chrono::Utc> {
        use siteauth_common::time::Clock;
        self.clock.now()
    }

    /// Register `SITE` as the stored, default site holding `token`
    pub fn seed_site(&self, token: TokenRecord) {
        self.directory.seed(site(SITE));
        self.directory.point_default_at(SITE);
        self.credentials.seed(SITE, token);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }
}

/// Let spawned fire-and-forget tasks (revocation, metadata refresh) run
pub async fn drain_background() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
