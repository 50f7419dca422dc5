//! Durable storage adapters
//!
//! - [`credential_store`]: token records in the platform keychain
//! - [`site_directory`]: site metadata and the default pointer in a JSON file

pub mod credential_store;
pub mod site_directory;

pub use credential_store::KeychainCredentialStore;
pub use site_directory::FileSiteDirectory;
