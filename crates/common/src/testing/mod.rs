//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory [`SecretStore`](crate::security::SecretStore)
//! - **[`time`]**: manually advanced [`Clock`](crate::time::Clock)
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use siteauth_common::testing::MockClock;
//! use siteauth_common::time::Clock;
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(300));
//! assert_eq!((clock.now() - start).num_seconds(), 300);
//! ```

pub mod mocks;
pub mod time;

pub use mocks::MockKeychainProvider;
pub use time::MockClock;
