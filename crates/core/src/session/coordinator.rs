//! Refresh coordinator - single-flight token renewal per site
//!
//! Owns every site's Session Handle: the refresh state, the current token
//! (published through a watch channel) and the time of the last attempt.
//!
//! ## Rotation order
//!
//! A successful refresh is committed strictly as:
//! 1. persist the new record to the credential store
//! 2. swap the in-memory token readers observe
//! 3. spawn revocation of the superseded access token, never awaited
//!
//! If step 1 fails nothing is swapped and the old token stays authoritative.
//! A handle deactivated mid-refresh still gets step 1 and 3; only a logout
//! throws the new record away.
//!
//! ## Single flight
//!
//! The check-and-set of `Idle -> Refreshing` happens inside one synchronous
//! lock scope before the first `.await`, so concurrent triggers for the same
//! site observe `Refreshing` and are dropped. A handle is never removed or
//! reset while its refresh is outstanding; callers that need the result
//! wait on it with [`RefreshCoordinator::join_in_flight`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use siteauth_common::time::Clock;
use siteauth_domain::{
    RefreshError, RefreshState, SessionConfig, SessionStatus, SiteRecord, TokenRecord,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::accessor::TokenAccessor;
use super::events::{EventBus, SessionEvent};
use super::machine::{transition, Effect, RefreshEvent, SkipReason};
use super::ports::{Connectivity, CredentialStore, SiteDirectory, TokenEndpoint};

/// What a `consider_refresh` call ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No network call was made
    Skipped(SkipReason),
    /// New token persisted, swapped in, old one queued for revocation
    Rotated,
    /// Transient failure; the next trigger retries
    NetworkUnavailable,
    /// New token could not be persisted; old token kept
    StorageFailed,
    /// Credential rejected; session torn down
    ForcedLogout { reason: String },
    /// The site was logged out while the refresh was in flight
    Superseded,
}

type OutcomeSender = watch::Sender<Option<RefreshOutcome>>;

/// In-memory state for one site
struct SessionHandle {
    site: SiteRecord,
    state: RefreshState,
    token: watch::Sender<Option<TokenRecord>>,
    generation: u64,
    /// Cleared by deactivation; an inactive handle only lives until its
    /// outstanding refresh settles
    active: bool,
    /// Set by logout; a refresh settling on a retired handle is discarded
    retired: bool,
    /// Rotations committed through this handle
    rotations: u64,
    in_flight: Option<watch::Receiver<Option<RefreshOutcome>>>,
    last_refresh_attempt_at: Option<DateTime<Utc>>,
}

impl SessionHandle {
    fn new(site: SiteRecord, generation: u64) -> Self {
        Self {
            site,
            state: RefreshState::Idle,
            token: watch::channel(None).0,
            generation,
            active: true,
            retired: false,
            rotations: 0,
            in_flight: None,
            last_refresh_attempt_at: None,
        }
    }
}

/// Refresh token the server rejected, remembered until the cooldown ends
struct Rejection {
    refresh_token: String,
    until: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    handles: HashMap<String, SessionHandle>,
    rejected: HashMap<String, Rejection>,
}

/// Snapshot taken when a refresh is started
struct RefreshAttempt {
    site: SiteRecord,
    old: TokenRecord,
    generation: u64,
}

/// Per-site refresh state machine driver
pub struct RefreshCoordinator {
    credentials: Arc<dyn CredentialStore>,
    directory: Arc<dyn SiteDirectory>,
    endpoint: Arc<dyn TokenEndpoint>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    config: SessionConfig,
    registry: Mutex<Registry>,
    next_generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        directory: Arc<dyn SiteDirectory>,
        endpoint: Arc<dyn TokenEndpoint>,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        config: SessionConfig,
    ) -> Self {
        Self {
            credentials,
            directory,
            endpoint,
            connectivity,
            clock,
            events,
            config,
            registry: Mutex::new(Registry::default()),
            next_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Install `token` as the current credential for `site`, creating the
    /// Session Handle if needed.
    ///
    /// Accessors handed out earlier for the same site keep working and
    /// observe the new token. A refresh already in flight for the site stays
    /// in flight and its result replaces `token` when it lands.
    pub fn install(&self, site: SiteRecord, token: TokenRecord) -> TokenAccessor {
        self.install_checked(site, token, None)
    }

    /// Install a record just read from the credential store.
    ///
    /// `seen` is [`RefreshCoordinator::rotations`] sampled before the read;
    /// if a rotation committed in between, the handle keeps its newer token.
    pub fn install_loaded(&self, site: SiteRecord, token: TokenRecord, seen: u64) -> TokenAccessor {
        self.install_checked(site, token, Some(seen))
    }

    fn install_checked(&self, site: SiteRecord, token: TokenRecord, seen: Option<u64>) -> TokenAccessor {
        let now = self.clock.now();
        let site_id = site.site_id.clone();
        let mut registry = self.registry.lock();
        let Registry { handles, rejected } = &mut *registry;

        // A logged-out handle may still be waiting on its refresh; that
        // refresh must not touch the new session.
        if handles.get(&site_id).is_some_and(|handle| handle.retired) {
            handles.remove(&site_id);
        }
        let handle = handles.entry(site_id.clone()).or_insert_with(|| {
            SessionHandle::new(site.clone(), self.next_generation.fetch_add(1, Ordering::SeqCst) + 1)
        });
        handle.site = site;
        handle.active = true;

        let keep_current =
            seen.is_some_and(|seen| seen != handle.rotations) && handle.token.borrow().is_some();
        if keep_current {
            debug!(site_id = %site_id, "Token rotated during activation; keeping in-memory token");
        } else {
            handle.token.send_replace(Some(token));
        }

        let cooldown_until = match rejected.get(&site_id) {
            Some(rejection)
                if rejection.until > now
                    && handle
                        .token
                        .borrow()
                        .as_ref()
                        .is_some_and(|t| t.refresh_token == rejection.refresh_token) =>
            {
                Some(rejection.until)
            }
            _ => None,
        };
        if cooldown_until.is_none() {
            rejected.remove(&site_id);
        }
        handle.state = transition(handle.state, RefreshEvent::Reinstalled { cooldown_until }).next;

        debug!(site_id = %site_id, generation = handle.generation, state = handle.state.label(), "Session handle installed");
        TokenAccessor::new(site_id, handle.token.subscribe())
    }

    /// Deactivate the Session Handle for `site_id`, returning its last token.
    ///
    /// Outstanding accessors observe `None` afterwards. Stored state is not
    /// touched; a refresh still in flight persists its result before the
    /// handle goes away.
    pub fn deactivate(&self, site_id: &str) -> Option<TokenRecord> {
        self.release(site_id, false)
    }

    /// Deactivate `site_id` for logout: a refresh still in flight discards
    /// and revokes whatever it obtains.
    pub fn retire(&self, site_id: &str) -> Option<TokenRecord> {
        self.release(site_id, true)
    }

    fn release(&self, site_id: &str, retire: bool) -> Option<TokenRecord> {
        let mut registry = self.registry.lock();
        let handle = registry.handles.get_mut(site_id)?;
        let last = handle.token.send_replace(None);

        if handle.state.is_refreshing() {
            handle.active = false;
            handle.retired |= retire;
            debug!(site_id = %site_id, retire, "Session handle parked until its refresh settles");
        } else {
            registry.handles.remove(site_id);
            debug!(site_id = %site_id, "Session handle removed");
        }
        last
    }

    /// Accessor for an active session
    #[must_use]
    pub fn accessor(&self, site_id: &str) -> Option<TokenAccessor> {
        let registry = self.registry.lock();
        registry
            .handles
            .get(site_id)
            .filter(|handle| handle.active)
            .map(|handle| TokenAccessor::new(site_id.to_string(), handle.token.subscribe()))
    }

    /// Number of rotations committed through the current handle
    #[must_use]
    pub fn rotations(&self, site_id: &str) -> u64 {
        self.registry.lock().handles.get(site_id).map_or(0, |handle| handle.rotations)
    }

    /// Replace the cached site record after a metadata refresh
    pub fn update_site(&self, site: SiteRecord) {
        if let Some(handle) = self.registry.lock().handles.get_mut(&site.site_id) {
            handle.site = site;
        }
    }

    /// Diagnostic snapshot of one active session
    #[must_use]
    pub fn status(&self, site_id: &str) -> Option<SessionStatus> {
        let now = self.clock.now();
        let registry = self.registry.lock();
        let handle = registry.handles.get(site_id).filter(|handle| handle.active)?;
        let token = handle.token.borrow();

        Some(SessionStatus {
            site_id: site_id.to_string(),
            state: handle.state,
            seconds_until_expiry: token.as_ref().and_then(|t| t.seconds_until_expiry(now)),
            has_token: token.is_some(),
            last_refresh_attempt_at: handle.last_refresh_attempt_at,
        })
    }

    /// Wait for the refresh outstanding for `site_id`, if any, and return
    /// how it ended.
    ///
    /// A refresh whose task was cancelled reports `NetworkUnavailable`.
    pub async fn join_in_flight(&self, site_id: &str) -> Option<RefreshOutcome> {
        let mut done = {
            let registry = self.registry.lock();
            registry.handles.get(site_id)?.in_flight.clone()?
        };
        let outcome = done.wait_for(Option::is_some).await.map(|outcome| outcome.clone());
        Some(outcome.ok().flatten().unwrap_or(RefreshOutcome::NetworkUnavailable))
    }

    /// Re-evaluate `site_id` and refresh its token if it is due.
    ///
    /// Safe to call from any number of triggers at once: while a refresh is
    /// in flight every other call returns `Skipped(InFlight)` without
    /// touching the network.
    pub async fn consider_refresh(&self, site_id: &str) -> RefreshOutcome {
        let (attempt, done) = match self.begin(site_id) {
            Ok(started) => started,
            Err(reason) => {
                debug!(site_id = %site_id, reason = reason.as_str(), "Refresh skipped");
                return RefreshOutcome::Skipped(reason);
            }
        };

        let mut guard = InFlightGuard::new(self, site_id, attempt.generation, done);
        info!(site_id = %site_id, "Refreshing access token");

        let timeout = self.config.refresh_timeout();
        let result = match tokio::time::timeout(
            timeout,
            self.endpoint.refresh(&attempt.site, &attempt.old.refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RefreshError::NetworkUnavailable(format!(
                "refresh timed out after {}s",
                timeout.as_secs()
            ))),
        };

        let outcome = match result {
            Ok(new_token) => self.commit_rotation(attempt, new_token).await,
            Err(err) if err.is_unrecoverable() => self.force_logout(&attempt, err.reason()).await,
            Err(err) => {
                warn!(site_id = %site_id, error = %err, "Refresh deferred; will retry on next trigger");
                self.settle(site_id, attempt.generation, RefreshEvent::NetworkUnavailable);
                RefreshOutcome::NetworkUnavailable
            }
        };
        guard.complete(outcome.clone());
        outcome
    }

    /// Synchronous check-and-set. No `.await` may happen in here.
    fn begin(&self, site_id: &str) -> Result<(RefreshAttempt, OutcomeSender), SkipReason> {
        let now = self.clock.now();
        let online = self.connectivity.is_online();
        let threshold = self.config.refresh_threshold();

        let mut registry = self.registry.lock();
        let handle = registry.handles.get_mut(site_id).ok_or(SkipReason::NoSession)?;
        let current = handle.token.borrow().clone();
        let due = current.as_ref().is_some_and(|token| token.needs_refresh(threshold, now));

        let step = transition(handle.state, RefreshEvent::Consider { due, online, now });
        handle.state = step.next;

        match (step.effect, current) {
            (Effect::BeginRefresh, Some(old)) => {
                let (done, waiter) = watch::channel(None);
                handle.in_flight = Some(waiter);
                handle.last_refresh_attempt_at = Some(now);
                let attempt =
                    RefreshAttempt { site: handle.site.clone(), old, generation: handle.generation };
                Ok((attempt, done))
            }
            (Effect::Skip(reason), _) => Err(reason),
            _ => {
                handle.state = RefreshState::Idle;
                Err(SkipReason::NotDue)
            }
        }
    }

    async fn commit_rotation(&self, attempt: RefreshAttempt, new_token: TokenRecord) -> RefreshOutcome {
        let owned_site_id = attempt.site.site_id.clone();
        let site_id = owned_site_id.as_str();

        if !self.owns(site_id, attempt.generation) {
            debug!(site_id = %site_id, "Site logged out during refresh; discarding new token");
            self.settle(site_id, attempt.generation, RefreshEvent::Discarded);
            self.spawn_revoke(attempt.site, new_token.access_token);
            return RefreshOutcome::Superseded;
        }

        if let Err(err) = self.credentials.put(site_id, &new_token).await {
            warn!(site_id = %site_id, error = %err, "Failed to persist refreshed token; keeping previous token");
            self.settle(site_id, attempt.generation, RefreshEvent::PersistFailed);
            return RefreshOutcome::StorageFailed;
        }

        let committed = {
            let mut registry = self.registry.lock();
            match registry.handles.get_mut(site_id) {
                Some(handle) if handle.generation == attempt.generation && !handle.retired => {
                    handle.rotations += 1;
                    if handle.active {
                        handle.token.send_replace(Some(new_token.clone()));
                    }
                    Some(handle.active)
                }
                _ => None,
            }
        };

        let Some(active) = committed else {
            self.restore_after_superseded_write(site_id).await;
            self.settle(site_id, attempt.generation, RefreshEvent::Discarded);
            self.spawn_revoke(attempt.site, new_token.access_token);
            return RefreshOutcome::Superseded;
        };

        self.settle(site_id, attempt.generation, RefreshEvent::Succeeded);
        self.spawn_revoke(attempt.site, attempt.old.access_token);
        if active {
            info!(site_id = %site_id, "Access token rotated");
            self.events.publish(SessionEvent::TokenRotated { site_id: site_id.to_string() });
        } else {
            info!(site_id = %site_id, "Access token rotated for a deactivated session");
        }
        RefreshOutcome::Rotated
    }

    async fn force_logout(&self, attempt: &RefreshAttempt, reason: String) -> RefreshOutcome {
        let site_id = attempt.site.site_id.as_str();
        let cooldown_until = chrono::Duration::from_std(self.config.rejection_cooldown())
            .ok()
            .and_then(|cooldown| self.clock.now().checked_add_signed(cooldown))
            .unwrap_or_else(|| self.clock.now());

        let effect = {
            let mut registry = self.registry.lock();
            let Registry { handles, rejected } = &mut *registry;
            let effect = match handles.get_mut(site_id) {
                Some(handle) if handle.generation == attempt.generation && !handle.retired => {
                    let step = transition(handle.state, RefreshEvent::Rejected { cooldown_until });
                    handle.state = step.next;
                    handle.in_flight = None;
                    Some(step.effect)
                }
                _ => None,
            };
            if effect == Some(Effect::ForceLogout) {
                if let Some(handle) = handles.remove(site_id) {
                    handle.token.send_replace(None);
                }
                rejected.insert(
                    site_id.to_string(),
                    Rejection { refresh_token: attempt.old.refresh_token.clone(), until: cooldown_until },
                );
            }
            effect
        };
        if effect != Some(Effect::ForceLogout) {
            self.settle(site_id, attempt.generation, RefreshEvent::Discarded);
            return RefreshOutcome::Superseded;
        }

        warn!(site_id = %site_id, reason = %reason, "Credential rejected; forcing logout");

        if let Err(err) = self.credentials.delete(site_id).await {
            warn!(site_id = %site_id, error = %err, "Failed to delete rejected credential");
        }
        match self.directory.get_default().await {
            Ok(Some(default)) if default == site_id => {
                if let Err(err) = self.directory.clear_default().await {
                    warn!(site_id = %site_id, error = %err, "Failed to clear default site");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(site_id = %site_id, error = %err, "Failed to read default site"),
        }

        self.events.publish(SessionEvent::ForceLogout {
            site_id: site_id.to_string(),
            reason: reason.clone(),
        });
        RefreshOutcome::ForcedLogout { reason }
    }

    /// Our write landed after a logout; put back what the current owner of
    /// the slot expects.
    async fn restore_after_superseded_write(&self, site_id: &str) {
        let current = self
            .registry
            .lock()
            .handles
            .get(site_id)
            .filter(|handle| !handle.retired)
            .and_then(|handle| handle.token.borrow().clone());
        let result = match current {
            Some(token) => self.credentials.put(site_id, &token).await,
            None => self.credentials.delete(site_id).await,
        };
        if let Err(err) = result {
            warn!(site_id = %site_id, error = %err, "Failed to restore credential after superseded refresh");
        }
    }

    fn owns(&self, site_id: &str, generation: u64) -> bool {
        self.registry
            .lock()
            .handles
            .get(site_id)
            .is_some_and(|handle| handle.generation == generation && !handle.retired)
    }

    /// Apply a completion event; a deactivated handle goes away once its
    /// refresh has settled.
    fn settle(&self, site_id: &str, generation: u64, event: RefreshEvent) {
        let mut registry = self.registry.lock();
        let Some(handle) = registry.handles.get_mut(site_id) else {
            return;
        };
        if handle.generation != generation {
            return;
        }
        handle.state = transition(handle.state, event).next;
        if handle.state.is_refreshing() {
            return;
        }
        handle.in_flight = None;
        if !handle.active {
            registry.handles.remove(site_id);
            debug!(site_id = %site_id, "Deactivated session handle released");
        }
    }

    fn spawn_revoke(&self, site: SiteRecord, access_token: String) {
        let endpoint = Arc::clone(&self.endpoint);
        tokio::spawn(async move {
            if let Err(err) = endpoint.revoke(&site, &access_token).await {
                debug!(site_id = %site.site_id, error = %err, "Token revocation failed (ignored)");
            }
        });
    }
}

/// Releases the single-flight guard if the refresh future is dropped before
/// it settles.
struct InFlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    site_id: &'a str,
    generation: u64,
    done: Option<OutcomeSender>,
}

impl<'a> InFlightGuard<'a> {
    fn new(
        coordinator: &'a RefreshCoordinator,
        site_id: &'a str,
        generation: u64,
        done: OutcomeSender,
    ) -> Self {
        Self { coordinator, site_id, generation, done: Some(done) }
    }

    /// Hand the settled outcome to anyone joined on this refresh
    fn complete(&mut self, outcome: RefreshOutcome) {
        if let Some(done) = self.done.take() {
            done.send_replace(Some(outcome));
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            debug!(site_id = %self.site_id, "Refresh cancelled; releasing guard");
            self.coordinator.settle(self.site_id, self.generation, RefreshEvent::NetworkUnavailable);
            drop(done);
        }
    }
}
