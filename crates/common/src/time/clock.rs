//! Wall-clock abstraction for testability
//!
//! # Examples
//!
//! ```
//! use siteauth_common::time::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! let now = clock.now();
//! assert!(now.timestamp() > 0);
//! ```

use chrono::{DateTime, Utc};

/// Source of the current UTC time
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
