//! # SiteAuth Infrastructure
//!
//! Infrastructure implementations of the session ports defined in
//! `siteauth-core`.
//!
//! This crate contains:
//! - Keychain credential store and file-backed site directory
//! - HTTP token endpoint client (refresh, revoke, code exchange, metadata)
//! - Connectivity monitor and the periodic/reconnect trigger scheduler
//! - Configuration loading from environment and files
//!
//! ## Architecture
//! - Implements traits defined in `siteauth-core`
//! - Contains all "impure" code (I/O, network, platform keychain)

pub mod config;
pub mod connectivity;
pub mod errors;
pub mod http;
pub mod scheduling;
pub mod storage;

// Re-export commonly used items
pub use connectivity::ConnectivityMonitor;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, HttpTokenEndpoint};
pub use scheduling::{RefreshScheduler, RefreshSchedulerConfig, SchedulerError};
pub use storage::{FileSiteDirectory, KeychainCredentialStore};
