//! # SiteAuth Domain
//!
//! Business domain types and models for SiteAuth.
//!
//! This crate contains:
//! - Site and token records (SiteRecord, TokenRecord, etc.)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants (endpoint paths, defaults)
//!
//! ## Architecture
//! - No dependencies on other SiteAuth crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
