//! Driver error types

use packet::LoadError;
use services_partition_scheduler::SchedulerError;
use thiserror::Error;

/// Errors surfaced by the simulation driver
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("Failed to load packet: {0}")]
    Load(#[from] LoadError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Simulation not initialized")]
    NotInitialized,
}
