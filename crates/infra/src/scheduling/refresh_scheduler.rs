//! Refresh trigger scheduler
//!
//! Owns the background task that feeds the trigger multiplexer:
//! - a periodic tick every `interval`
//! - a reconnect trigger on every offline to online edge reported by the
//!   connectivity watch channel
//!
//! Foreground transitions come from the host application and are fired on
//! the multiplexer directly.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use siteauth_core::TriggerMultiplexer;
//! # use siteauth_infra::connectivity::ConnectivityMonitor;
//! use siteauth_infra::scheduling::{RefreshScheduler, RefreshSchedulerConfig, SchedulerResult};
//!
//! # async fn example(
//! #     multiplexer: Arc<TriggerMultiplexer>,
//! #     monitor: Arc<ConnectivityMonitor>,
//! # ) -> SchedulerResult<()> {
//! let mut scheduler =
//!     RefreshScheduler::new(multiplexer, monitor.subscribe(), RefreshSchedulerConfig::default());
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use siteauth_core::{Trigger, TriggerMultiplexer};
use siteauth_domain::SessionConfig;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the refresh scheduler
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
    /// Periodic tick interval; must stay below the refresh threshold
    pub interval: Duration,
    /// Timeout for awaiting the loop task on stop
    pub join_timeout: Duration,
}

impl Default for RefreshSchedulerConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for RefreshSchedulerConfig {
    fn from(config: &SessionConfig) -> Self {
        Self { interval: config.check_interval(), join_timeout: Duration::from_secs(5) }
    }
}

/// Periodic and reconnect trigger source
pub struct RefreshScheduler {
    multiplexer: Arc<TriggerMultiplexer>,
    connectivity: watch::Receiver<bool>,
    config: RefreshSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl RefreshScheduler {
    pub fn new(
        multiplexer: Arc<TriggerMultiplexer>,
        connectivity: watch::Receiver<bool>,
        config: RefreshSchedulerConfig,
    ) -> Self {
        Self {
            multiplexer,
            connectivity,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the trigger loop.
    ///
    /// The first periodic tick fires one interval after start; activation
    /// already evaluated the token.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the scheduler can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let multiplexer = Arc::clone(&self.multiplexer);
        let connectivity = self.connectivity.clone();
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::trigger_loop(multiplexer, connectivity, interval, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(interval_secs = interval.as_secs(), "Refresh scheduler started");
        Ok(())
    }

    /// Stop the trigger loop and wait for it to exit.
    ///
    /// A refresh in progress is cancelled; the coordinator releases its
    /// single-flight guard and the next trigger retries.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running or the loop does not exit
    /// within the join timeout
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })??;
        }

        info!("Refresh scheduler stopped");
        Ok(())
    }

    /// A scheduler is running while its loop task has not finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn trigger_loop(
        multiplexer: Arc<TriggerMultiplexer>,
        connectivity: watch::Receiver<bool>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut online = *connectivity.borrow();
        let mut connectivity = Some(connectivity);

        loop {
            let trigger = tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => Trigger::PeriodicTick,
                changed = wait_for_change(connectivity.as_mut()) => {
                    if !changed {
                        debug!("Connectivity source closed; reconnect triggers disabled");
                        connectivity = None;
                        continue;
                    }
                    let now_online =
                        connectivity.as_mut().map_or(online, |rx| *rx.borrow_and_update());
                    let reconnected = now_online && !online;
                    online = now_online;
                    if !reconnected {
                        continue;
                    }
                    Trigger::Reconnected
                }
            };

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(trigger = trigger.as_str(), "Trigger cancelled by shutdown");
                    break;
                }
                outcome = multiplexer.fire(trigger) => {
                    debug!(trigger = trigger.as_str(), ?outcome, "Trigger handled");
                }
            }
        }

        debug!("Refresh trigger loop exited");
    }
}

/// Resolves when the watched value changes; `false` once the sender is
/// gone. Never resolves without a receiver.
async fn wait_for_change(rx: Option<&mut watch::Receiver<bool>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RefreshScheduler dropped while running; cancelling tasks");
            self.cancellation_token.cancel();
        }
    }
}
