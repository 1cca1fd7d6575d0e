//! # Core Types
//!
//! This crate defines the fundamental types shared by the batch simulator.
//!
//! ## Philosophy
//!
//! - **Closed state sets**: task kind and task state are exhaustive enums.
//! - **Presentation at the edge**: labels live in `Display` impls, never in
//!   the transition logic.
//! - **Explicit transitions**: a task only changes state through
//!   [`Task::dispatch`] and [`Task::advance`].
//!
//! ## Key Types
//!
//! - [`TaskId`]: Stable ordinal of a task within its packet
//! - [`RunId`]: Unique identifier of one simulation run
//! - [`Task`]: The `Wait -> Run -> Ready` state machine

pub mod ids;
pub mod task;

pub use ids::{RunId, TaskId};
pub use task::{InvalidTransition, Progress, Task, TaskKind, TaskState};
