//! Scheduler events
//!
//! Everything the scheduler does is reported as a [`SchedulerEvent`]. Events
//! are rendered into [`LogEntry`] values for the caller's sink; the wording
//! of the rendered line is not part of any contract.

use crate::processor::ProcessorState;
use core_types::{TaskId, TaskKind, TaskState};
use serde::{Deserialize, Serialize};
use services_logger::{LogEntry, LogLevel};
use std::fmt;

/// Scheduling event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    /// A new tick began
    TickStarted { tick: u64 },
    /// Processor state at the start of the tick
    ProcessorAtStart { state: ProcessorState },
    /// Processor state at the end of the tick
    ProcessorAtEnd { state: ProcessorState },
    /// Partition occupancy summary
    Occupancy { used: usize, capacity: usize },
    /// Status of one occupied partition
    SlotStatus {
        slot: usize,
        task: TaskId,
        kind: TaskKind,
        memory: i64,
        state: TaskState,
    },
    /// A finished task vacated its partition
    TaskFreed { task: TaskId, slot: usize },
    /// A waiting task was placed into a partition
    TaskLoaded {
        task: TaskId,
        kind: TaskKind,
        slot: usize,
    },
    /// A task was pushed back to the wait queue by a shrink
    TaskEvicted { task: TaskId, slot: usize },
    /// A task was dispatched (`Wait -> Run`)
    TaskStarted {
        task: TaskId,
        kind: TaskKind,
        slot: usize,
    },
    /// A running task consumed one unit of service time
    TaskProgress {
        task: TaskId,
        kind: TaskKind,
        elapsed: u32,
        required: u32,
    },
    /// A task reached its required service time
    TaskCompleted { task: TaskId, kind: TaskKind },
    /// The partition count changed
    CapacityChanged {
        old: usize,
        new: usize,
        automatic: bool,
        returned: usize,
    },
    /// More partitions occupied than exist
    OverOccupancy { used: usize, capacity: usize },
    /// The processor changed state
    ProcessorTransition {
        from: ProcessorState,
        to: ProcessorState,
        reason: String,
    },
    /// Occupancy figures accompanying a transition
    ProcessorDiagnostics {
        used: usize,
        capacity: usize,
        running_math: usize,
        running_io: usize,
    },
}

impl SchedulerEvent {
    pub fn level(&self) -> LogLevel {
        match self {
            SchedulerEvent::OverOccupancy { .. } => LogLevel::Warn,
            SchedulerEvent::ProcessorDiagnostics { .. } => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    /// Task the event is about, if any
    pub fn task(&self) -> Option<TaskId> {
        match self {
            SchedulerEvent::SlotStatus { task, .. }
            | SchedulerEvent::TaskFreed { task, .. }
            | SchedulerEvent::TaskLoaded { task, .. }
            | SchedulerEvent::TaskEvicted { task, .. }
            | SchedulerEvent::TaskStarted { task, .. }
            | SchedulerEvent::TaskProgress { task, .. }
            | SchedulerEvent::TaskCompleted { task, .. } => Some(*task),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::TickStarted { .. } => "tick_started",
            SchedulerEvent::ProcessorAtStart { .. } => "processor_at_start",
            SchedulerEvent::ProcessorAtEnd { .. } => "processor_at_end",
            SchedulerEvent::Occupancy { .. } => "occupancy",
            SchedulerEvent::SlotStatus { .. } => "slot_status",
            SchedulerEvent::TaskFreed { .. } => "task_freed",
            SchedulerEvent::TaskLoaded { .. } => "task_loaded",
            SchedulerEvent::TaskEvicted { .. } => "task_evicted",
            SchedulerEvent::TaskStarted { .. } => "task_started",
            SchedulerEvent::TaskProgress { .. } => "task_progress",
            SchedulerEvent::TaskCompleted { .. } => "task_completed",
            SchedulerEvent::CapacityChanged { .. } => "capacity_changed",
            SchedulerEvent::OverOccupancy { .. } => "over_occupancy",
            SchedulerEvent::ProcessorTransition { .. } => "processor_transition",
            SchedulerEvent::ProcessorDiagnostics { .. } => "processor_diagnostics",
        }
    }

    /// Renders the event as a log entry stamped with `tick`
    pub fn to_entry(&self, tick: u64) -> LogEntry {
        let mut entry = LogEntry::new(self.level(), self.to_string())
            .with_tick(tick)
            .with_field("event", self.name());
        if let Some(task) = self.task() {
            entry = entry.with_source(task);
        }
        entry
    }
}

impl fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerEvent::TickStarted { tick } => write!(f, "\nTick-{}", tick),
            SchedulerEvent::ProcessorAtStart { state } => {
                write!(f, "Initial processor state: {}", state)
            }
            SchedulerEvent::ProcessorAtEnd { state } => {
                write!(f, "Final processor state: {}", state)
            }
            SchedulerEvent::Occupancy { used, capacity } => {
                write!(f, "Partitions in use: {}/{}", used, capacity)
            }
            SchedulerEvent::SlotStatus {
                slot,
                task,
                kind,
                memory,
                state,
            } => write!(
                f,
                "Partition {}: task {} {} {}MB {}",
                slot + 1,
                task.get(),
                kind,
                memory,
                state
            ),
            SchedulerEvent::TaskFreed { task, slot } => write!(
                f,
                "Task {} finished, freeing partition {}",
                task.get(),
                slot + 1
            ),
            SchedulerEvent::TaskLoaded { task, kind, slot } => write!(
                f,
                "Task {} ({}) loaded into partition {}",
                task.get(),
                kind,
                slot + 1
            ),
            SchedulerEvent::TaskEvicted { task, slot } => write!(
                f,
                "Task {} evicted from partition {} back to the wait queue",
                task.get(),
                slot + 1
            ),
            SchedulerEvent::TaskStarted { task, kind, slot } => write!(
                f,
                "Started task {} ({}) in partition {}",
                task.get(),
                kind,
                slot + 1
            ),
            SchedulerEvent::TaskProgress {
                task,
                kind,
                elapsed,
                required,
            } => write!(
                f,
                "Task {} ({}) running: {}/{} ticks",
                task.get(),
                kind,
                elapsed,
                required
            ),
            SchedulerEvent::TaskCompleted { task, kind } => {
                write!(f, "Task {} ({}) completed!", task.get(), kind)
            }
            SchedulerEvent::CapacityChanged {
                old,
                new,
                automatic,
                returned,
            } => {
                let origin = if *automatic { "auto-adjusted" } else { "changed" };
                write!(f, "Partition count {}: {} -> {}", origin, old, new)?;
                if *returned > 0 {
                    write!(f, " ({} tasks returned to the wait queue)", returned)?;
                }
                Ok(())
            }
            SchedulerEvent::OverOccupancy { used, capacity } => write!(
                f,
                "WARNING: partition limit exceeded! ({} > {})",
                used, capacity
            ),
            SchedulerEvent::ProcessorTransition { from, to, reason } => {
                write!(f, "CPU SWITCH: {} -> {} ({})", from, to, reason)
            }
            SchedulerEvent::ProcessorDiagnostics {
                used,
                capacity,
                running_math,
                running_io,
            } => write!(
                f,
                "Diagnostics: partitions={}/{}, MATH={}, INOUT={}",
                used, capacity, running_math, running_io
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let warn = SchedulerEvent::OverOccupancy {
            used: 3,
            capacity: 2,
        };
        assert_eq!(warn.level(), LogLevel::Warn);

        let debug = SchedulerEvent::ProcessorDiagnostics {
            used: 1,
            capacity: 2,
            running_math: 1,
            running_io: 0,
        };
        assert_eq!(debug.level(), LogLevel::Debug);

        assert_eq!(SchedulerEvent::TickStarted { tick: 1 }.level(), LogLevel::Info);
    }

    #[test]
    fn test_entry_carries_task_and_tick() {
        let event = SchedulerEvent::TaskCompleted {
            task: TaskId::new(4),
            kind: TaskKind::Io,
        };
        let entry = event.to_entry(9);
        assert_eq!(entry.source, Some(TaskId::new(4)));
        assert_eq!(entry.tick, Some(9));
        assert_eq!(entry.field("event"), Some("task_completed"));
        assert_eq!(entry.message, "Task 4 (INOUT) completed!");
    }

    #[test]
    fn test_transition_line_names_both_states() {
        let event = SchedulerEvent::ProcessorTransition {
            from: ProcessorState::Idle,
            to: ProcessorState::IoWait,
            reason: "1 active INOUT tasks".to_string(),
        };
        let line = event.to_string();
        assert!(line.contains("IDLE"));
        assert!(line.contains("IO WAIT"));
        assert!(line.contains("1 active INOUT tasks"));
    }

    #[test]
    fn test_capacity_change_line() {
        let event = SchedulerEvent::CapacityChanged {
            old: 4,
            new: 2,
            automatic: false,
            returned: 1,
        };
        assert_eq!(
            event.to_string(),
            "Partition count changed: 4 -> 2 (1 tasks returned to the wait queue)"
        );
    }
}
