//! Application constants
//!
//! Centralized location for domain-level constants: relative endpoint paths
//! resolved against a site's `base_url`, and lifecycle defaults.

// Remote endpoints (relative to a site's base_url)
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const REVOKE_PATH: &str = "/oauth/revoke";
pub const SERVER_SETTINGS_PATH: &str = "/api/v1/server_settings";

// Refresh lifecycle defaults (seconds)
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 720;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REJECTION_COOLDOWN_SECS: u64 = 300;

// HTTP defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_REDIRECT_URI: &str = "siteauth://oauth/callback";

// Storage defaults
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "SiteAuth.credentials";
pub const DEFAULT_SITE_DIRECTORY_FILE: &str = "siteauth-sites.json";

// Session event fan-out capacity
pub const SESSION_EVENT_CAPACITY: usize = 64;
