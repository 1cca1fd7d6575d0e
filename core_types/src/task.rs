//! Single-job state machine
//!
//! A task moves strictly `Wait -> Run -> Ready`. There are no cycles and no
//! skipped states: `Ready` is terminal until the whole simulation is reset.

use crate::ids::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Compute-bound job
    Math,
    /// I/O-bound job
    Io,
}

impl TaskKind {
    /// Service time (in ticks of `Run`) a task of this kind needs
    pub const fn required_ticks(self) -> u32 {
        match self {
            TaskKind::Math => 3,
            TaskKind::Io => 2,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Math => write!(f, "MATH"),
            TaskKind::Io => write!(f, "INOUT"),
        }
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Not yet started
    Wait,
    /// Dispatched and consuming service time
    Run,
    /// Finished (terminal)
    Ready,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Wait => write!(f, "WAIT"),
            TaskState::Run => write!(f, "RUN"),
            TaskState::Ready => write!(f, "READY"),
        }
    }
}

/// Rejected state machine operation
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{task}: cannot {operation} while in state {state}")]
pub struct InvalidTransition {
    pub task: TaskId,
    pub operation: &'static str,
    pub state: TaskState,
}

/// Result of advancing a running task by one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Still needs more service time
    Pending,
    /// Reached its required service time and is now `Ready`
    Completed,
}

/// A job in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    /// Job number as written in the descriptor (informational)
    number: i64,
    kind: TaskKind,
    /// Declared memory demand in MB (informational only)
    memory: i64,
    state: TaskState,
    elapsed: u32,
    required: u32,
}

impl Task {
    /// Creates a task in `Wait` with zero elapsed service time
    pub fn new(id: TaskId, number: i64, kind: TaskKind, memory: i64) -> Self {
        Self {
            id,
            number,
            kind,
            memory,
            state: TaskState::Wait,
            elapsed: 0,
            required: kind.required_ticks(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn memory(&self) -> i64 {
        self.memory
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Run
    }

    /// Moves the task from `Wait` to `Run`
    pub fn dispatch(&mut self) -> Result<(), InvalidTransition> {
        if self.state != TaskState::Wait {
            return Err(self.invalid("dispatch"));
        }
        self.state = TaskState::Run;
        Ok(())
    }

    /// Consumes one unit of service time
    ///
    /// Only valid in `Run`. Once `elapsed` reaches `required` the task becomes
    /// `Ready` and stays there.
    pub fn advance(&mut self) -> Result<Progress, InvalidTransition> {
        if self.state != TaskState::Run {
            return Err(self.invalid("advance"));
        }
        self.elapsed += 1;
        if self.elapsed >= self.required {
            self.state = TaskState::Ready;
            Ok(Progress::Completed)
        } else {
            Ok(Progress::Pending)
        }
    }

    /// Restores the task to its freshly loaded state
    pub fn reset(&mut self) {
        self.state = TaskState::Wait;
        self.elapsed = 0;
    }

    fn invalid(&self, operation: &'static str) -> InvalidTransition {
        InvalidTransition {
            task: self.id,
            operation,
            state: self.state,
        }
    }
}
