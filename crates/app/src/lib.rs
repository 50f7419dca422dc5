//! # SiteAuth App
//!
//! Application layer - dependency wiring and the `siteauth` entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Logging setup and structured session event logging
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Exposes the host hooks (foreground, connectivity, login, logout)

pub mod context;
pub mod utils;

pub use context::AppContext;
