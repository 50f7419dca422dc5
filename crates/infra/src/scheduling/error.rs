//! Scheduler error types

use siteauth_domain::SiteAuthError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoinFailed(err.to_string())
    }
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let mapped = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                SiteAuthError::InvalidInput(err.to_string())
            }
            _ => SiteAuthError::Internal(err.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<SchedulerError> for SiteAuthError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
