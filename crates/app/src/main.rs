//! SiteAuth - multi-site OAuth2 session daemon
//!
//! Restores the default site's session, keeps its token fresh until
//! Ctrl-C, then shuts down cleanly.

use std::time::Duration;

use anyhow::Context;
use siteauth_app::utils::logging::{error_label, init_tracing, log_session_event};
use siteauth_app::AppContext;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before logging so RUST_LOG from the file applies
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) => tracing::debug!(error = %err, "No .env file loaded"),
    }

    let config = siteauth_infra::config::load().context("failed to load configuration")?;
    let check_interval = config.session.check_interval();
    let ctx = AppContext::new(config).context("failed to initialise application context")?;

    let mut events = ctx.subscribe();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_session_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Session event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Err(err) = ctx.start().await {
        warn!(error = %err, label = error_label(&err), "Startup failed");
        return Err(err).context("failed to start refresh scheduler");
    }
    if let Some(status) = ctx.status() {
        info!(
            site_id = %status.site_id,
            seconds_until_expiry = ?status.seconds_until_expiry,
            "Session active"
        );
    }

    let mut ticker = tokio::time::interval(check_interval.max(Duration::from_secs(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "Ctrl-C handler failed; shutting down");
                }
                break;
            }
            _ = ticker.tick() => {
                if let Some(online) = ctx.check_connectivity().await {
                    tracing::debug!(online, "Connectivity checked");
                }
            }
        }
    }

    info!("Shutting down");
    ctx.shutdown().await.context("shutdown failed")?;
    drop(ctx);
    event_logger.abort();
    Ok(())
}
