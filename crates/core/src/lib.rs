//! # SiteAuth Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (credential store, site directory, token
//!   endpoint, connectivity)
//! - The per-site refresh state machine and its coordinator
//! - Trigger multiplexing, session bootstrap, logout and login use cases
//!
//! ## Architecture Principles
//! - Only depends on `siteauth-common` and `siteauth-domain`
//! - No keychain, filesystem or HTTP code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod login;
pub mod session;

// Re-export specific items to avoid ambiguity
pub use login::{AuthorizationRequest, LoginFlow};
pub use session::bootstrap::SessionBootstrapper;
pub use session::coordinator::{RefreshCoordinator, RefreshOutcome};
pub use session::events::{EventBus, SessionEvent};
pub use session::machine::SkipReason;
pub use session::manager::SessionManager;
pub use session::ports::{Connectivity, CredentialStore, SiteDirectory, TokenEndpoint};
pub use session::triggers::{Trigger, TriggerMultiplexer};
pub use session::TokenAccessor;
