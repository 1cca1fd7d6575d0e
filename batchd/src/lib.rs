//! # Batch Simulation Host
//!
//! This crate provides the host runtime for the partition scheduler.
//!
//! ## Philosophy
//!
//! - **Host owns I/O**: The scheduler and driver never print
//! - **Output is a line stream**: Delivered through a log sink
//! - **Control is explicit**: Partition changes come from a script, not stdin
//! - **Deterministic mode is first-class**: For tests
//!
//! ## Responsibilities
//!
//! The host runtime:
//! - Merges defaults, an optional config file and command-line flags
//! - Loads the job descriptor
//! - Applies scripted resize/reset commands between ticks
//! - Exports the run history as JSON
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Render charts or a GUI
//! - Run more than one simulation at a time

pub mod control_script;
pub mod runtime;

pub use control_script::{ControlAction, ControlScript, ControlScriptError, ScheduledAction};
pub use runtime::{HostConfig, HostError, HostRuntime};
