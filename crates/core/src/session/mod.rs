//! Session lifecycle management
//!
//! ```text
//!   timer ─┐
//!   foreground ─┼─► TriggerMultiplexer ─► RefreshCoordinator ─► TokenEndpoint
//!   reconnect ─┘                              │    │
//!                                             │    └─► CredentialStore (persist)
//!                                             └─► TokenAccessor (swap)
//!
//!   SessionManager ─► SessionBootstrapper ─► SiteDirectory / CredentialStore
//! ```

pub mod accessor;
pub mod bootstrap;
pub mod coordinator;
pub mod events;
pub mod machine;
pub mod manager;
pub mod ports;
pub mod triggers;

pub use accessor::TokenAccessor;
