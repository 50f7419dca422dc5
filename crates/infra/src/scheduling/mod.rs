//! Scheduling infrastructure for refresh triggers
//!
//! The scheduler follows the runtime rules used across the workspace:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout on the shutdown join

pub mod error;
pub mod refresh_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use refresh_scheduler::{RefreshScheduler, RefreshSchedulerConfig};
