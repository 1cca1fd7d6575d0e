//! Scheduler error types

use thiserror::Error;

/// Errors surfaced by the partition scheduler
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Partition count must be positive
    #[error("Invalid partition count: {0} (must be positive)")]
    InvalidCapacity(i64),
}
