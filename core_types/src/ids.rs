//! Identifiers for simulation entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a task within a packet
///
/// Task identifiers are assigned in descriptor order, starting at 1, and stay
/// stable for the lifetime of the packet (including across resets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u32);

impl TaskId {
    /// Creates a task ID from its 1-based ordinal
    pub const fn new(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// Creates the task ID for the task at `index` (0-based) in a packet
    pub fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// Returns the 1-based ordinal
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Returns the 0-based position of the task in its packet
    pub fn index(&self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Identifier for one simulation run
///
/// A fresh run ID is minted on every initialize and every reset, so that
/// history snapshots from different runs are never confused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run({})", self.0)
    }
}
