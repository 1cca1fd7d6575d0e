//! # Batch Simulation Driver
//!
//! This crate runs a partition scheduler over one task packet.
//!
//! ## Purpose
//!
//! The driver owns a single scheduler/packet pair and advances it one tick at
//! a time until every task is done or the tick budget is spent. It brackets
//! each run with a start banner and a finish summary, and records every change
//! of the partition count.
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! - Time is simulated: one call to [`SimulationDriver::step`] is one tick
//! - Runs are deterministic for a given packet and partition sequence
//! - Output goes through a [`LogSink`], so tests can inspect every line

pub mod config;
pub mod error;
pub mod test_utils;

pub use config::SimulationConfig;
pub use error::DriverError;

use packet::Packet;
use services_logger::{LogEntry, LogSink, MemoryLogSink};
use services_partition_scheduler::{
    History, HistorySnapshot, PartitionScheduler, ResizeOutcome,
};
use std::path::Path;
use std::time::{Duration, Instant};

/// Result of a single [`SimulationDriver::step`] call
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A tick ran and work remains
    Advanced(HistorySnapshot),
    /// Every task is done
    Finished,
    /// The tick budget is spent while work remains
    BudgetExhausted,
}

impl StepOutcome {
    /// True when further steps cannot make progress
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::Advanced(_))
    }
}

/// Summary of a completed [`SimulationDriver::start`] call
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub finished: bool,
    pub final_partitions: usize,
    pub unfinished_tasks: usize,
    pub wall_time: Duration,
}

/// Drives one scheduler through a packet
pub struct SimulationDriver<S = MemoryLogSink> {
    config: SimulationConfig,
    scheduler: Option<PartitionScheduler>,
    sink: S,
    ticks_executed: u64,
    memory_changes: Vec<String>,
    wall_time: Option<Duration>,
}

impl SimulationDriver {
    /// Creates a driver that keeps its output in memory
    pub fn new(config: SimulationConfig) -> Result<Self, DriverError> {
        Self::with_sink(config, MemoryLogSink::new())
    }
}

impl<S: LogSink> SimulationDriver<S> {
    /// Creates a driver writing to the given sink
    pub fn with_sink(config: SimulationConfig, sink: S) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler: None,
            sink,
            ticks_executed: 0,
            memory_changes: Vec::new(),
            wall_time: None,
        })
    }

    /// Installs a packet, replacing any previous one
    pub fn initialize(&mut self, packet: Packet) -> Result<(), DriverError> {
        let scheduler = PartitionScheduler::new(packet, self.config.partitions)?;
        log::debug!(
            "initialized {} with {} tasks over {} partitions",
            scheduler.history().run_id(),
            scheduler.packet().len(),
            scheduler.capacity()
        );
        self.memory_changes = vec![format!("initial: {} partitions", scheduler.capacity())];
        self.scheduler = Some(scheduler);
        self.ticks_executed = 0;
        self.wall_time = None;
        Ok(())
    }

    /// Loads a packet descriptor from disk and installs it
    pub fn initialize_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), DriverError> {
        let packet = Packet::from_path(path)?;
        self.initialize(packet)
    }

    /// Runs ticks until every task is done or the budget is spent
    pub fn start(&mut self) -> Result<RunSummary, DriverError> {
        self.run_with(|_| Ok::<(), DriverError>(()))
    }

    /// Like [`SimulationDriver::start`], calling `between_ticks` before every tick
    ///
    /// The callback may resize or reset the driver. Commands it would issue
    /// after the run stops are never delivered.
    pub fn run_with<F, E>(&mut self, mut between_ticks: F) -> Result<RunSummary, E>
    where
        F: FnMut(&mut Self) -> Result<(), E>,
        E: From<DriverError>,
    {
        self.emit_banner()?;
        let started = Instant::now();
        loop {
            between_ticks(self)?;
            if self.step()?.is_terminal() {
                break;
            }
        }
        self.wall_time = Some(started.elapsed());
        let summary = self.summary()?;
        self.emit_summary(&summary);
        log::info!(
            "run finished after {} ticks ({} unfinished tasks)",
            summary.ticks,
            summary.unfinished_tasks
        );
        Ok(summary)
    }

    /// Alias for [`SimulationDriver::start`]
    pub fn run(&mut self) -> Result<RunSummary, DriverError> {
        self.start()
    }

    /// Executes at most one tick
    pub fn step(&mut self) -> Result<StepOutcome, DriverError> {
        let scheduler = self.scheduler.as_mut().ok_or(DriverError::NotInitialized)?;
        if scheduler.is_finished() {
            return Ok(StepOutcome::Finished);
        }
        if self.ticks_executed >= self.config.max_ticks {
            return Ok(StepOutcome::BudgetExhausted);
        }

        let snapshot = scheduler.tick(&mut self.sink);
        self.ticks_executed += 1;

        if scheduler.is_finished() {
            Ok(StepOutcome::Finished)
        } else if self.ticks_executed >= self.config.max_ticks {
            Ok(StepOutcome::BudgetExhausted)
        } else {
            Ok(StepOutcome::Advanced(snapshot))
        }
    }

    /// Changes the partition count and records the change
    pub fn resize(&mut self, partitions: i64) -> Result<ResizeOutcome, DriverError> {
        let scheduler = self.scheduler.as_mut().ok_or(DriverError::NotInitialized)?;
        let outcome = scheduler.resize(partitions, &mut self.sink)?;
        if outcome.old != outcome.new {
            self.memory_changes.push(format!(
                "tick {}: {} -> {} partitions",
                scheduler.current_tick(),
                outcome.old,
                outcome.new
            ));
        }
        Ok(outcome)
    }

    /// Restores the freshly loaded state, keeping the current partition count
    pub fn reset(&mut self) -> Result<(), DriverError> {
        let scheduler = self.scheduler.as_mut().ok_or(DriverError::NotInitialized)?;
        scheduler.reset();
        self.memory_changes = vec![format!("initial: {} partitions", scheduler.capacity())];
        self.ticks_executed = 0;
        self.wall_time = None;
        log::debug!("reset into {}", scheduler.history().run_id());
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn scheduler(&self) -> Option<&PartitionScheduler> {
        self.scheduler.as_ref()
    }

    pub fn history(&self) -> Option<&History> {
        self.scheduler.as_ref().map(PartitionScheduler::history)
    }

    pub fn ticks_executed(&self) -> u64 {
        self.ticks_executed
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(PartitionScheduler::is_finished)
    }

    /// Partition-count changes of the current run, oldest first
    pub fn memory_change_log(&self) -> &[String] {
        &self.memory_changes
    }

    /// Wall-clock duration of the last completed [`SimulationDriver::start`]
    pub fn elapsed_wall_time(&self) -> Option<Duration> {
        self.wall_time
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn summary(&self) -> Result<RunSummary, DriverError> {
        let scheduler = self.scheduler.as_ref().ok_or(DriverError::NotInitialized)?;
        let done = scheduler.tasks().iter().filter(|t| t.is_ready()).count();
        Ok(RunSummary {
            ticks: self.ticks_executed,
            finished: scheduler.is_finished(),
            final_partitions: scheduler.capacity(),
            unfinished_tasks: scheduler.packet().len() - done,
            wall_time: self.wall_time.unwrap_or_default(),
        })
    }

    fn emit_banner(&mut self) -> Result<(), DriverError> {
        let scheduler = self.scheduler.as_ref().ok_or(DriverError::NotInitialized)?;
        let packet = scheduler.packet();
        let kind = packet
            .kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "EMPTY".to_string());
        let lines = vec![
            "START".to_string(),
            format!(
                "Total packet memory: {:.2} GB",
                packet.total_memory() as f64 / 1024.0
            ),
            format!("Total tasks: {}", packet.len()),
            format!("MATH tasks: {}", packet.math_count()),
            format!("INOUT tasks: {}", packet.io_count()),
            format!("Packet type: {}", kind),
            format!("Initial partitions: {}", scheduler.capacity()),
            format!("RAM: {} GB", self.config.ram_gb),
        ];
        for line in lines {
            self.sink
                .log(LogEntry::info(line).with_field("event", "banner"));
        }
        Ok(())
    }

    fn emit_summary(&mut self, summary: &RunSummary) {
        let mut lines = vec!["\nFINISH".to_string()];
        if summary.finished {
            lines.push(format!("All tasks completed in {} ticks", summary.ticks));
        } else {
            lines.push(format!(
                "Tick budget exhausted after {} ticks ({} tasks unfinished)",
                summary.ticks, summary.unfinished_tasks
            ));
        }
        lines.push(format!("Final partitions: {}", summary.final_partitions));
        if self.memory_changes.len() > 1 {
            lines.push("Partition changes:".to_string());
            lines.extend(self.memory_changes.iter().map(|c| format!("  {}", c)));
        }
        lines.push(format!(
            "Wall time: {:.3} ms",
            summary.wall_time.as_secs_f64() * 1000.0
        ));
        for line in lines {
            self.sink
                .log(LogEntry::info(line).with_field("event", "summary"));
        }
    }
}
