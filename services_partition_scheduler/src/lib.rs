//! # Partition Scheduler Service
//!
//! A deterministic fixed-partition batch scheduler.
//!
//! ## Philosophy
//!
//! - **Deterministic**: Partitions are visited in index order, every tick, no hidden threads
//! - **Explicit ticks**: Nothing moves unless [`PartitionScheduler::tick`] is called
//! - **Owned state**: Queues and partitions are private, mutated only through this API
//! - **Recompute, don't track**: The processor state is re-derived from occupancy
//!
//! ## Tick sequence
//!
//! 1. Auto-shrink: drop one partition when fewer than half are running (never below 2)
//! 2. Resize effects: evict the excess, highest partition first, to the wait queue front
//! 3. Free partitions holding finished tasks
//! 4. Admit waiting tasks into empty partitions, lowest index first
//! 5. Dispatch waiting residents, advance running ones
//! 6. Re-derive the processor state
//! 7. Append a history snapshot
//!
//! Growth only happens through [`PartitionScheduler::resize`].
//!
//! ## Example
//!
//! ```ignore
//! use services_partition_scheduler::PartitionScheduler;
//! use services_logger::MemoryLogSink;
//!
//! let mut scheduler = PartitionScheduler::new(packet, 2)?;
//! let mut sink = MemoryLogSink::new();
//!
//! while !scheduler.is_finished() {
//!     scheduler.tick(&mut sink);
//! }
//! ```

pub mod error;
pub mod events;
pub mod history;
pub mod processor;

pub use error::SchedulerError;
pub use events::SchedulerEvent;
pub use history::{History, HistorySnapshot};
pub use processor::{Occupancy, ProcessorState, ProcessorTracker, StateCounters, Transition};

use core_types::{Progress, RunId, Task, TaskId, TaskKind, TaskState};
use packet::Packet;
use services_logger::LogSink;
use std::collections::{BTreeSet, VecDeque};

/// Result of a partition count change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub old: usize,
    pub new: usize,
    /// Tasks returned to the wait queue, in their new queue order
    pub evicted: Vec<TaskId>,
}

/// Fixed-partition scheduler
pub struct PartitionScheduler {
    /// Packet as loaded (pristine task states)
    packet: Packet,
    /// Working copy of the packet's tasks, indexed by `TaskId::index`
    tasks: Vec<Task>,
    /// Partition table; its length is the current capacity
    slots: Vec<Option<TaskId>>,
    /// Tasks not yet admitted (FIFO)
    wait_queue: VecDeque<TaskId>,
    /// Finished tasks that vacated their partition
    ready_list: Vec<TaskId>,
    /// Residents that were dispatched; pruned at the free step
    running: BTreeSet<TaskId>,
    /// INOUT residents still running
    io_wait: BTreeSet<TaskId>,
    processor: ProcessorTracker,
    history: History,
    current_tick: u64,
}

fn validate_capacity(capacity: i64) -> Result<usize, SchedulerError> {
    if capacity <= 0 {
        return Err(SchedulerError::InvalidCapacity(capacity));
    }
    usize::try_from(capacity).map_err(|_| SchedulerError::InvalidCapacity(capacity))
}

impl PartitionScheduler {
    /// Creates a scheduler with every task of `packet` in the wait queue
    pub fn new(packet: Packet, capacity: usize) -> Result<Self, SchedulerError> {
        let capacity = validate_capacity(i64::try_from(capacity).unwrap_or(i64::MAX))?;
        let tasks = packet.tasks().to_vec();
        let wait_queue = tasks.iter().map(Task::id).collect();
        let history = History::new(RunId::new(), packet.math_count(), packet.io_count());

        Ok(Self {
            packet,
            tasks,
            slots: vec![None; capacity],
            wait_queue,
            ready_list: Vec::new(),
            running: BTreeSet::new(),
            io_wait: BTreeSet::new(),
            processor: ProcessorTracker::new(),
            history,
            current_tick: 0,
        })
    }

    /// Runs one full tick and returns the snapshot it recorded
    pub fn tick(&mut self, sink: &mut dyn LogSink) -> HistorySnapshot {
        self.current_tick += 1;
        self.emit(sink, SchedulerEvent::TickStarted {
            tick: self.current_tick,
        });
        self.emit(sink, SchedulerEvent::ProcessorAtStart {
            state: self.processor.state(),
        });
        self.emit_occupancy(sink);

        if self.running.len() < self.capacity() / 2 && self.capacity() > 2 {
            let target = self.capacity() - 1;
            self.apply_capacity(target, true, sink);
            self.emit_occupancy(sink);
        }

        self.report_slots(sink);

        let freed = self.free_completed(sink);
        let loaded = self.admit_waiting(sink);
        if freed || loaded {
            self.emit_occupancy(sink);
        }

        self.execute(sink);

        self.recompute_processor(sink);
        self.processor.count_tick();

        let snapshot = self.snapshot();
        self.history.record(snapshot, self.processor.counters());

        self.emit(sink, SchedulerEvent::ProcessorAtEnd {
            state: self.processor.state(),
        });
        snapshot
    }

    /// Changes the partition count
    ///
    /// Rejects non-positive counts without touching any state. When shrinking
    /// below the number of occupied partitions, the excess residents go back
    /// to the front of the wait queue.
    pub fn resize(
        &mut self,
        new_capacity: i64,
        sink: &mut dyn LogSink,
    ) -> Result<ResizeOutcome, SchedulerError> {
        let new = validate_capacity(new_capacity)?;
        let old = self.capacity();
        let evicted = self.apply_capacity(new, false, sink);
        Ok(ResizeOutcome { old, new, evicted })
    }

    /// Restores the freshly loaded state, keeping the current capacity
    pub fn reset(&mut self) {
        for task in &mut self.tasks {
            task.reset();
        }
        let capacity = self.capacity();
        self.slots = vec![None; capacity];
        self.wait_queue = self.packet.tasks().iter().map(Task::id).collect();
        self.ready_list.clear();
        self.running.clear();
        self.io_wait.clear();
        self.processor.reset();
        self.history = History::new(
            RunId::new(),
            self.packet.math_count(),
            self.packet.io_count(),
        );
        self.current_tick = 0;
    }

    /// True once nothing is waiting, running, or resident-but-unfinished
    pub fn is_finished(&self) -> bool {
        self.wait_queue.is_empty()
            && self.running.is_empty()
            && self.io_wait.is_empty()
            && self
                .slots
                .iter()
                .flatten()
                .all(|id| self.tasks[id.index()].is_ready())
    }

    /// Current number of partitions
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied partitions
    pub fn used_slots(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Number of the last executed tick (0 before the first)
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Processor state as of the last recompute
    pub fn processor_state(&self) -> ProcessorState {
        self.processor.state()
    }

    /// Ticks spent in each processor state so far
    pub fn state_counters(&self) -> StateCounters {
        self.processor.counters()
    }

    /// Snapshots recorded so far in this run
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The packet as loaded
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// Working copies of every task, in packet order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task by ID
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.index())
    }

    /// Partition table, indexed by partition
    pub fn slots(&self) -> &[Option<TaskId>] {
        &self.slots
    }

    /// Waiting tasks, front first
    pub fn wait_queue(&self) -> Vec<TaskId> {
        self.wait_queue.iter().copied().collect()
    }

    /// Finished tasks in the order they vacated their partition
    pub fn ready_list(&self) -> &[TaskId] {
        &self.ready_list
    }

    /// Size of the running set (finished residents included until freed)
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// INOUT residents that have not finished
    pub fn io_wait_count(&self) -> usize {
        self.io_wait.len()
    }

    /// MATH residents currently in `Run`
    pub fn running_math_count(&self) -> usize {
        self.running_of_kind(TaskKind::Math)
    }

    /// INOUT residents currently in `Run`
    pub fn running_io_count(&self) -> usize {
        self.running_of_kind(TaskKind::Io)
    }

    /// Tasks found in the wait queue, a partition, or the ready list
    ///
    /// Always equal to the packet size between ticks.
    pub fn accounted_tasks(&self) -> usize {
        self.wait_queue.len() + self.used_slots() + self.ready_list.len()
    }

    fn running_of_kind(&self, kind: TaskKind) -> usize {
        self.running
            .iter()
            .filter(|id| {
                let task = &self.tasks[id.index()];
                task.kind() == kind && task.is_running()
            })
            .count()
    }

    fn apply_capacity(
        &mut self,
        new: usize,
        automatic: bool,
        sink: &mut dyn LogSink,
    ) -> Vec<TaskId> {
        let old = self.capacity();
        if new == old {
            return Vec::new();
        }

        let mut occupants: Vec<(usize, TaskId)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| id.map(|id| (slot, id)))
            .collect();

        let mut evicted = Vec::new();
        while occupants.len() > new {
            if let Some((slot, id)) = occupants.pop() {
                self.running.remove(&id);
                self.io_wait.remove(&id);
                self.wait_queue.push_front(id);
                self.emit(sink, SchedulerEvent::TaskEvicted { task: id, slot });
                evicted.push(id);
            }
        }
        evicted.reverse();

        let mut slots = vec![None; new];
        for (index, (_, id)) in occupants.into_iter().enumerate() {
            slots[index] = Some(id);
        }
        self.slots = slots;

        log::debug!(
            "partitions {} -> {} (automatic: {}, evicted: {})",
            old,
            new,
            automatic,
            evicted.len()
        );
        self.emit(sink, SchedulerEvent::CapacityChanged {
            old,
            new,
            automatic,
            returned: evicted.len(),
        });
        self.recompute_processor(sink);
        evicted
    }

    fn report_slots(&self, sink: &mut dyn LogSink) {
        for (slot, id) in self.slots.iter().enumerate() {
            if let Some(id) = id {
                let task = &self.tasks[id.index()];
                self.emit(sink, SchedulerEvent::SlotStatus {
                    slot,
                    task: *id,
                    kind: task.kind(),
                    memory: task.memory(),
                    state: task.state(),
                });
            }
        }
    }

    fn free_completed(&mut self, sink: &mut dyn LogSink) -> bool {
        let mut freed = false;
        for slot in 0..self.slots.len() {
            if let Some(id) = self.slots[slot] {
                if self.tasks[id.index()].is_ready() {
                    self.slots[slot] = None;
                    self.running.remove(&id);
                    self.io_wait.remove(&id);
                    self.ready_list.push(id);
                    self.emit(sink, SchedulerEvent::TaskFreed { task: id, slot });
                    freed = true;
                }
            }
        }
        freed
    }

    fn admit_waiting(&mut self, sink: &mut dyn LogSink) -> bool {
        let mut loaded = false;
        for slot in 0..self.slots.len() {
            if self.slots[slot].is_some() {
                continue;
            }
            let Some(id) = self.wait_queue.pop_front() else {
                break;
            };
            self.slots[slot] = Some(id);
            loaded = true;
            self.emit(sink, SchedulerEvent::TaskLoaded {
                task: id,
                kind: self.tasks[id.index()].kind(),
                slot,
            });

            let used = self.used_slots();
            if used > self.capacity() {
                log::warn!("partition limit exceeded: {} > {}", used, self.capacity());
                self.emit(sink, SchedulerEvent::OverOccupancy {
                    used,
                    capacity: self.capacity(),
                });
            }
        }
        loaded
    }

    fn execute(&mut self, sink: &mut dyn LogSink) {
        for slot in 0..self.slots.len() {
            let Some(id) = self.slots[slot] else {
                continue;
            };
            let kind = self.tasks[id.index()].kind();
            match self.tasks[id.index()].state() {
                TaskState::Wait => {
                    if self.tasks[id.index()].dispatch().is_ok() {
                        self.enroll(id, kind);
                        self.emit(sink, SchedulerEvent::TaskStarted {
                            task: id,
                            kind,
                            slot,
                        });
                        self.advance(id, sink);
                    }
                }
                TaskState::Run => {
                    // A resident evicted mid-run re-joins the running sets on re-admission
                    self.enroll(id, kind);
                    self.advance(id, sink);
                }
                TaskState::Ready => {}
            }
        }
    }

    fn enroll(&mut self, id: TaskId, kind: TaskKind) {
        self.running.insert(id);
        if kind == TaskKind::Io {
            self.io_wait.insert(id);
        }
    }

    fn advance(&mut self, id: TaskId, sink: &mut dyn LogSink) {
        let task = &mut self.tasks[id.index()];
        let Ok(progress) = task.advance() else {
            return;
        };
        let (kind, elapsed, required) = (task.kind(), task.elapsed(), task.required());

        self.emit(sink, SchedulerEvent::TaskProgress {
            task: id,
            kind,
            elapsed,
            required,
        });
        if progress == Progress::Completed {
            self.io_wait.remove(&id);
            self.emit(sink, SchedulerEvent::TaskCompleted { task: id, kind });
        }
    }

    fn occupancy(&self) -> Occupancy {
        let mut occupancy = Occupancy {
            capacity: self.capacity(),
            ..Occupancy::default()
        };
        for id in self.slots.iter().flatten() {
            occupancy.used += 1;
            let task = &self.tasks[id.index()];
            if task.is_running() {
                match task.kind() {
                    TaskKind::Math => occupancy.running_math += 1,
                    TaskKind::Io => occupancy.running_io += 1,
                }
            }
        }
        occupancy
    }

    fn recompute_processor(&mut self, sink: &mut dyn LogSink) {
        let occupancy = self.occupancy();
        if let Some(transition) = self.processor.recompute(&occupancy) {
            self.emit(sink, SchedulerEvent::ProcessorTransition {
                from: transition.from,
                to: transition.to,
                reason: transition.reason,
            });
            self.emit(sink, SchedulerEvent::ProcessorDiagnostics {
                used: occupancy.used,
                capacity: occupancy.capacity,
                running_math: occupancy.running_math,
                running_io: occupancy.running_io,
            });
        }
    }

    fn snapshot(&self) -> HistorySnapshot {
        let used = self.used_slots();
        HistorySnapshot {
            tick: self.current_tick,
            used_slots: used,
            capacity: self.capacity(),
            cpu_state: self.processor.state(),
            wait_count: self.wait_queue.len(),
            run_count: self
                .running
                .iter()
                .filter(|id| self.tasks[id.index()].is_running())
                .count(),
            ready_count: self.ready_list.len(),
            free_memory_percent: HistorySnapshot::free_percent(used, self.capacity()),
        }
    }

    fn emit_occupancy(&self, sink: &mut dyn LogSink) {
        self.emit(sink, SchedulerEvent::Occupancy {
            used: self.used_slots(),
            capacity: self.capacity(),
        });
    }

    fn emit(&self, sink: &mut dyn LogSink, event: SchedulerEvent) {
        sink.log(event.to_entry(self.current_tick));
    }
}
