//! Per-tick history for the statistics view
//!
//! One [`HistorySnapshot`] is appended per executed tick and never touched
//! again. The [`History`] also carries the cumulative processor counters and
//! the packet's MATH/INOUT totals, which is everything a chart renderer needs.

use crate::processor::{ProcessorState, StateCounters};
use core_types::RunId;
use serde::{Deserialize, Serialize};

/// Aggregate state at the end of one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub tick: u64,
    pub used_slots: usize,
    pub capacity: usize,
    pub cpu_state: ProcessorState,
    pub wait_count: usize,
    pub run_count: usize,
    pub ready_count: usize,
    pub free_memory_percent: f64,
}

impl HistorySnapshot {
    /// Share of partitions left free, clamped at zero
    pub fn free_percent(used: usize, capacity: usize) -> f64 {
        if capacity == 0 {
            return 0.0;
        }
        let used_percent = used as f64 / capacity as f64 * 100.0;
        (100.0 - used_percent).max(0.0)
    }
}

/// Append-only run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    run_id: RunId,
    snapshots: Vec<HistorySnapshot>,
    state_counters: StateCounters,
    math_total: usize,
    io_total: usize,
}

impl History {
    /// Creates an empty history for one run
    pub fn new(run_id: RunId, math_total: usize, io_total: usize) -> Self {
        Self {
            run_id,
            snapshots: Vec::new(),
            state_counters: StateCounters::default(),
            math_total,
            io_total,
        }
    }

    pub(crate) fn record(&mut self, snapshot: HistorySnapshot, counters: StateCounters) {
        self.snapshots.push(snapshot);
        self.state_counters = counters;
    }

    /// Identifier of the run this history belongs to
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Every snapshot, oldest first
    pub fn snapshots(&self) -> &[HistorySnapshot] {
        &self.snapshots
    }

    /// Most recent snapshot
    pub fn last(&self) -> Option<&HistorySnapshot> {
        self.snapshots.last()
    }

    /// Number of recorded ticks
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True before the first tick
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Cumulative ticks per processor state
    pub fn state_counters(&self) -> StateCounters {
        self.state_counters
    }

    /// MATH tasks in the packet
    pub fn math_total(&self) -> usize {
        self.math_total
    }

    /// INOUT tasks in the packet
    pub fn io_total(&self) -> usize {
        self.io_total
    }

    /// Tick numbers series
    pub fn ticks(&self) -> Vec<u64> {
        self.series(|s| s.tick)
    }

    /// Occupied partitions per tick
    pub fn used_slots(&self) -> Vec<usize> {
        self.series(|s| s.used_slots)
    }

    /// Processor state per tick
    pub fn cpu_states(&self) -> Vec<ProcessorState> {
        self.series(|s| s.cpu_state)
    }

    /// Wait queue length per tick
    pub fn wait_counts(&self) -> Vec<usize> {
        self.series(|s| s.wait_count)
    }

    /// Running task count per tick
    pub fn run_counts(&self) -> Vec<usize> {
        self.series(|s| s.run_count)
    }

    /// Ready list length per tick
    pub fn ready_counts(&self) -> Vec<usize> {
        self.series(|s| s.ready_count)
    }

    /// Free partition percentage per tick
    pub fn free_memory_percent(&self) -> Vec<f64> {
        self.series(|s| s.free_memory_percent)
    }

    /// Finished tasks as a percentage of the packet, per tick
    pub fn completion_percent(&self) -> Vec<f64> {
        let total = self.math_total + self.io_total;
        self.series(|s| {
            if total == 0 {
                0.0
            } else {
                s.ready_count as f64 / total as f64 * 100.0
            }
        })
    }

    /// Pretty-printed JSON export
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn series<T>(&self, f: impl Fn(&HistorySnapshot) -> T) -> Vec<T> {
        self.snapshots.iter().map(f).collect()
    }
}
