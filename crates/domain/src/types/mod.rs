//! Domain data types
//!
//! - [`site`]: site directory records and merge patches
//! - [`token`]: persisted token records and the wire token response
//! - [`session`]: per-site refresh state reported for diagnostics

pub mod session;
pub mod site;
pub mod token;

pub use session::{RefreshState, SessionStatus};
pub use site::{SiteRecord, SiteRecordPatch};
pub use token::{TokenRecord, TokenResponse};
