//! Login use case
//!
//! Seeds the first token record for a site through the authorization-code
//! grant with PKCE. Everything after that belongs to the session lifecycle.

pub mod service;

pub use service::{AuthorizationRequest, LoginFlow};
