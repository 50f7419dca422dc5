//! Time utilities and abstractions
//!
//! - **[`clock`]**: wall-clock abstraction so expiry math can run against a
//!   manually advanced clock in tests (see `testing::MockClock`)

pub mod clock;

pub use clock::{Clock, SystemClock};
