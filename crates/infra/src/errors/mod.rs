//! Infrastructure error handling

pub mod conversions;

pub use conversions::{keychain_storage_error, refresh_transport_error, InfraError};
