//! Processor state tracking
//!
//! The processor state is never updated incrementally. Every evaluation
//! derives it from scratch out of the current partition occupancy, with a
//! fixed priority: `Overloaded > Executing > IoWait > Idle`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate CPU state
///
/// Serialized under the same names it displays with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProcessorState {
    /// No running task of either kind
    #[default]
    #[serde(rename = "IDLE")]
    Idle,
    /// At least one MATH task is running
    #[serde(rename = "EXECUTING")]
    Executing,
    /// Only INOUT tasks are running
    #[serde(rename = "IO WAIT")]
    IoWait,
    /// More partitions occupied than exist
    #[serde(rename = "OVERLOADED")]
    Overloaded,
}

impl ProcessorState {
    /// Every state, in display order
    pub const ALL: [ProcessorState; 4] = [
        ProcessorState::Idle,
        ProcessorState::Executing,
        ProcessorState::IoWait,
        ProcessorState::Overloaded,
    ];
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorState::Idle => write!(f, "IDLE"),
            ProcessorState::Executing => write!(f, "EXECUTING"),
            ProcessorState::IoWait => write!(f, "IO WAIT"),
            ProcessorState::Overloaded => write!(f, "OVERLOADED"),
        }
    }
}

/// Occupancy figures the processor state is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Occupancy {
    /// Occupied partitions
    pub used: usize,
    /// Current partition count
    pub capacity: usize,
    /// Partition-resident MATH tasks in `Run`
    pub running_math: usize,
    /// Partition-resident INOUT tasks in `Run`
    pub running_io: usize,
}

impl Occupancy {
    /// Derives the processor state (first match wins)
    pub fn derive(&self) -> ProcessorState {
        if self.used > self.capacity {
            ProcessorState::Overloaded
        } else if self.running_math > 0 {
            ProcessorState::Executing
        } else if self.running_io > 0 {
            ProcessorState::IoWait
        } else {
            ProcessorState::Idle
        }
    }

    fn reason(&self, state: ProcessorState, recovering: bool) -> String {
        let detail = match state {
            ProcessorState::Overloaded => {
                return format!(
                    "memory overload: {} > {} partitions",
                    self.used, self.capacity
                )
            }
            ProcessorState::Executing => format!("{} active MATH tasks", self.running_math),
            ProcessorState::IoWait => format!("{} active INOUT tasks", self.running_io),
            ProcessorState::Idle => "no active tasks".to_string(),
        };
        if recovering {
            format!("recovered from overload, {}", detail)
        } else {
            detail
        }
    }
}

/// A processor state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ProcessorState,
    pub to: ProcessorState,
    pub reason: String,
}

/// Cumulative ticks spent in each processor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateCounters {
    pub idle: u64,
    pub executing: u64,
    pub io_wait: u64,
    pub overloaded: u64,
}

impl StateCounters {
    /// Ticks counted for one state
    pub fn get(&self, state: ProcessorState) -> u64 {
        match state {
            ProcessorState::Idle => self.idle,
            ProcessorState::Executing => self.executing,
            ProcessorState::IoWait => self.io_wait,
            ProcessorState::Overloaded => self.overloaded,
        }
    }

    /// Counts one tick in `state`
    pub fn increment(&mut self, state: ProcessorState) {
        match state {
            ProcessorState::Idle => self.idle += 1,
            ProcessorState::Executing => self.executing += 1,
            ProcessorState::IoWait => self.io_wait += 1,
            ProcessorState::Overloaded => self.overloaded += 1,
        }
    }

    /// Ticks counted across all states
    pub fn total(&self) -> u64 {
        self.idle + self.executing + self.io_wait + self.overloaded
    }
}

/// Current processor state plus its per-state tick counters
#[derive(Debug, Clone, Default)]
pub struct ProcessorTracker {
    state: ProcessorState,
    counters: StateCounters,
}

impl ProcessorTracker {
    /// Creates a tracker in `Idle` with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Current processor state
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Per-state tick counters
    pub fn counters(&self) -> StateCounters {
        self.counters
    }

    /// Re-derives the state; returns the transition if the state changed
    pub fn recompute(&mut self, occupancy: &Occupancy) -> Option<Transition> {
        let next = occupancy.derive();
        if next == self.state {
            return None;
        }
        let recovering = self.state == ProcessorState::Overloaded;
        let transition = Transition {
            from: self.state,
            to: next,
            reason: occupancy.reason(next, recovering),
        };
        self.state = next;
        Some(transition)
    }

    /// Charges one tick to the current state
    pub fn count_tick(&mut self) {
        self.counters.increment(self.state);
    }

    /// Back to `Idle` with zeroed counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(used: usize, capacity: usize, math: usize, io: usize) -> Occupancy {
        Occupancy {
            used,
            capacity,
            running_math: math,
            running_io: io,
        }
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(occ(3, 2, 1, 1).derive(), ProcessorState::Overloaded);
        assert_eq!(occ(2, 2, 1, 1).derive(), ProcessorState::Executing);
        assert_eq!(occ(2, 2, 0, 1).derive(), ProcessorState::IoWait);
        assert_eq!(occ(2, 2, 0, 0).derive(), ProcessorState::Idle);
        assert_eq!(occ(0, 4, 0, 0).derive(), ProcessorState::Idle);
    }

    #[test]
    fn test_serialized_names_match_display() {
        for state in ProcessorState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
            let back: ProcessorState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
        assert_eq!(
            serde_json::to_string(&ProcessorState::IoWait).unwrap(),
            "\"IO WAIT\""
        );
    }

    #[test]
    fn test_overload_ignores_composition() {
        assert_eq!(occ(5, 4, 0, 0).derive(), ProcessorState::Overloaded);
        assert_eq!(occ(5, 4, 3, 0).derive(), ProcessorState::Overloaded);
    }

    #[test]
    fn test_recompute_reports_only_changes() {
        let mut tracker = ProcessorTracker::new();
        assert_eq!(tracker.state(), ProcessorState::Idle);
        assert!(tracker.recompute(&occ(0, 2, 0, 0)).is_none());

        let transition = tracker.recompute(&occ(1, 2, 1, 0)).unwrap();
        assert_eq!(transition.from, ProcessorState::Idle);
        assert_eq!(transition.to, ProcessorState::Executing);
        assert_eq!(transition.reason, "1 active MATH tasks");

        assert!(tracker.recompute(&occ(2, 2, 2, 0)).is_none());
    }

    #[test]
    fn test_recompute_is_not_sticky() {
        let mut tracker = ProcessorTracker::new();
        tracker.recompute(&occ(2, 2, 1, 1));
        assert_eq!(tracker.state(), ProcessorState::Executing);

        // MATH done, INOUT still running
        tracker.recompute(&occ(2, 2, 0, 1));
        assert_eq!(tracker.state(), ProcessorState::IoWait);

        // MATH running again wins over INOUT
        tracker.recompute(&occ(2, 2, 1, 1));
        assert_eq!(tracker.state(), ProcessorState::Executing);
    }

    #[test]
    fn test_overload_recovery_reason() {
        let mut tracker = ProcessorTracker::new();
        let overload = tracker.recompute(&occ(3, 2, 1, 0)).unwrap();
        assert_eq!(overload.reason, "memory overload: 3 > 2 partitions");

        let recovery = tracker.recompute(&occ(2, 2, 0, 1)).unwrap();
        assert_eq!(recovery.from, ProcessorState::Overloaded);
        assert_eq!(recovery.to, ProcessorState::IoWait);
        assert_eq!(recovery.reason, "recovered from overload, 1 active INOUT tasks");
    }

    #[test]
    fn test_counters_charge_current_state() {
        let mut tracker = ProcessorTracker::new();
        tracker.count_tick();
        tracker.recompute(&occ(1, 1, 1, 0));
        tracker.count_tick();
        tracker.count_tick();

        let counters = tracker.counters();
        assert_eq!(counters.get(ProcessorState::Idle), 1);
        assert_eq!(counters.get(ProcessorState::Executing), 2);
        assert_eq!(counters.total(), 3);

        tracker.reset();
        assert_eq!(tracker.counters().total(), 0);
        assert_eq!(tracker.state(), ProcessorState::Idle);
    }
}
