//! Configuration loading
//!
//! Resolves the domain [`Config`](siteauth_domain::Config) from environment
//! variables, a config file, or defaults.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, discover_config_path};
