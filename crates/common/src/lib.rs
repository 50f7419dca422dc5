//! Modular common utilities shared across SiteAuth crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: serde/thiserror/chrono plumbing only
//! - `runtime`: clock abstraction for time-dependent logic
//! - `platform`: platform integrations (keychain, PKCE)
//! - `observability`: tracing (pulled in by `runtime`)
//! - `test-utils`: in-memory keychain and manually advanced clock

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod time;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "platform")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::pkce::PkceChallenge;
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider, SecretStore};
#[cfg(feature = "runtime")]
pub use time::{Clock, SystemClock};
