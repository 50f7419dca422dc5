use siteauth_core::SessionEvent;
use siteauth_domain::SiteAuthError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,siteauth=debug";

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `info` with debug
/// output for the siteauth crates. `SITEAUTH_LOG_JSON=1` switches to JSON
/// lines. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("SITEAUTH_LOG_JSON")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if json { builder.json().try_init() } else { builder.try_init() };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Log a session lifecycle event with structured fields.
///
/// Tokens never reach the log; only the site id and event name do.
pub fn log_session_event(event: &SessionEvent) {
    let site_id = event.site_id();
    match event {
        SessionEvent::ForceLogout { reason, .. } => {
            warn!(event = event.name(), site_id, reason = %reason, "session_event");
        }
        _ => info!(event = event.name(), site_id, "session_event"),
    }
}

/// Convert a `SiteAuthError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &SiteAuthError) -> &'static str {
    match error {
        SiteAuthError::Storage(_) => "storage",
        SiteAuthError::Config(_) => "config",
        SiteAuthError::Platform(_) => "platform",
        SiteAuthError::Network(_) => "network",
        SiteAuthError::Auth(_) => "auth",
        SiteAuthError::NotFound(_) => "not_found",
        SiteAuthError::InvalidInput(_) => "invalid_input",
        SiteAuthError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_labels_are_stable() {
        assert_eq!(error_label(&SiteAuthError::Storage("x".into())), "storage");
        assert_eq!(error_label(&SiteAuthError::NotFound("x".into())), "not_found");
        assert_eq!(error_label(&SiteAuthError::Auth("x".into())), "auth");
    }

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
        log_session_event(&SessionEvent::LoggedOut { site_id: "acme".into() });
    }
}
