//! Security primitives
//!
//! Platform keychain access plus the [`SecretStore`] seam that lets
//! credential storage run against an in-memory store in tests.

pub mod keychain;
pub mod traits;

pub use keychain::{KeychainError, KeychainProvider};
pub use traits::SecretStore;
