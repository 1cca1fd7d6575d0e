//! End-to-end simulation scenarios

use core_types::{TaskId, TaskKind, TaskState};
use packet::Packet;
use services_partition_scheduler::ProcessorState;
use sim_batch::test_utils::{alternating_packet, driver_for, packet_of, run_checked};
use sim_batch::{DriverError, SimulationConfig, SimulationDriver, StepOutcome};
use std::io::Write;
use tempfile::NamedTempFile;

fn task_state(driver: &SimulationDriver, ordinal: u32) -> (TaskState, u32) {
    let task = driver
        .scheduler()
        .unwrap()
        .task(TaskId::new(ordinal))
        .unwrap();
    (task.state(), task.elapsed())
}

#[test]
fn test_math_and_io_pair_from_descriptor_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"tasks": [{{"num": 1, "type": "MATH", "memory": 100}}, {{"num": 2, "type": "INOUT", "memory": 50}}]}}"#
    )
    .unwrap();

    let mut driver = SimulationDriver::new(SimulationConfig::new(2, 10)).unwrap();
    driver.initialize_from_path(file.path()).unwrap();

    // Tick 1: both admitted, dispatched and advanced once
    assert!(matches!(driver.step().unwrap(), StepOutcome::Advanced(_)));
    assert_eq!(task_state(&driver, 1), (TaskState::Run, 1));
    assert_eq!(task_state(&driver, 2), (TaskState::Run, 1));
    assert_eq!(
        driver.scheduler().unwrap().processor_state(),
        ProcessorState::Executing
    );

    // Tick 2: the IO task completes
    driver.step().unwrap();
    assert_eq!(task_state(&driver, 1), (TaskState::Run, 2));
    assert_eq!(task_state(&driver, 2), (TaskState::Ready, 2));

    // Tick 3: IO slot freed, Math completes
    driver.step().unwrap();
    assert_eq!(task_state(&driver, 1), (TaskState::Ready, 3));
    assert_eq!(driver.scheduler().unwrap().ready_list(), [TaskId::new(2)]);

    // Tick 4: Math slot freed and the run is over
    assert_eq!(driver.step().unwrap(), StepOutcome::Finished);
    let scheduler = driver.scheduler().unwrap();
    assert_eq!(scheduler.current_tick(), 4);
    assert_eq!(scheduler.ready_list(), [TaskId::new(2), TaskId::new(1)]);
    assert_eq!(scheduler.used_slots(), 0);
    assert_eq!(scheduler.processor_state(), ProcessorState::Idle);

    let history = driver.history().unwrap();
    assert_eq!(history.ticks(), vec![1, 2, 3, 4]);
    assert_eq!(history.ready_counts(), vec![0, 0, 1, 2]);
    assert_eq!(history.state_counters().total(), 4);
}

#[test]
fn test_start_runs_the_pair_to_completion() {
    let packet = packet_of(&[TaskKind::Math, TaskKind::Io]);
    let mut driver = driver_for(packet, 2, 10);
    let summary = driver.start().unwrap();
    assert!(summary.finished);
    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.unfinished_tasks, 0);
    assert_eq!(driver.scheduler().unwrap().ready_list().len(), 2);
}

#[test]
fn test_bad_descriptor_leaves_driver_uninitialized() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"tasks": [{{"num": 1, "type": "DISK", "memory": 10}}]}}"#).unwrap();

    let mut driver = SimulationDriver::new(SimulationConfig::new(2, 10)).unwrap();
    let result = driver.initialize_from_path(file.path());
    assert!(matches!(result, Err(DriverError::Load(_))));
    assert!(driver.scheduler().is_none());
    assert_eq!(driver.step(), Err(DriverError::NotInitialized));
}

#[test]
fn test_shrink_mid_run_evicts_to_queue_front() {
    let mut driver = driver_for(alternating_packet(4), 2, 50);
    driver.step().unwrap();

    let outcome = driver.resize(1).unwrap();
    assert_eq!(outcome.evicted, vec![TaskId::new(2)]);
    let scheduler = driver.scheduler().unwrap();
    assert_eq!(
        scheduler.wait_queue(),
        vec![TaskId::new(2), TaskId::new(3), TaskId::new(4)]
    );
    assert_eq!(scheduler.accounted_tasks(), 4);
    // The evicted IO task keeps its progress
    assert_eq!(task_state(&driver, 2), (TaskState::Run, 1));

    run_checked(&mut driver);
    assert!(driver.is_finished());
    assert_eq!(driver.scheduler().unwrap().ready_list().len(), 4);
    assert_eq!(
        driver.memory_change_log(),
        ["initial: 2 partitions", "tick 1: 2 -> 1 partitions"]
    );
}

#[test]
fn test_growth_only_through_resize() {
    let mut driver = driver_for(alternating_packet(6), 2, 50);
    driver.step().unwrap();
    driver.resize(5).unwrap();
    driver.step().unwrap();

    let scheduler = driver.scheduler().unwrap();
    assert_eq!(scheduler.capacity(), 5);
    assert_eq!(scheduler.used_slots(), 5);

    run_checked(&mut driver);
    let capacities: Vec<usize> = driver
        .history()
        .unwrap()
        .snapshots()
        .iter()
        .map(|s| s.capacity)
        .collect();
    assert!(capacities.windows(2).skip(1).all(|w| w[1] <= w[0]));
}

#[test]
fn test_auto_shrink_ratchets_down_while_idle() {
    let mut driver = driver_for(packet_of(&[TaskKind::Math]), 6, 50);
    driver.start().unwrap();
    let capacities: Vec<usize> = driver
        .history()
        .unwrap()
        .snapshots()
        .iter()
        .map(|s| s.capacity)
        .collect();
    // The finished task still counts as running on the tick that frees it
    assert_eq!(capacities, vec![5, 4, 3, 3]);
}

#[test]
fn test_reset_then_rerun_matches_first_run() {
    let mut driver = driver_for(alternating_packet(5), 2, 100);
    driver.start().unwrap();
    let first = driver.history().unwrap().snapshots().to_vec();

    driver.reset().unwrap();
    driver.start().unwrap();
    assert_eq!(driver.history().unwrap().snapshots(), first.as_slice());
}

#[test]
fn test_identical_inputs_produce_identical_streams() {
    let run = || {
        let mut driver = driver_for(alternating_packet(7), 3, 100);
        driver.step().unwrap();
        driver.resize(2).unwrap();
        driver.start().unwrap();
        driver
            .into_sink()
            .entries()
            .iter()
            .filter(|e| e.field("event") != Some("summary"))
            .map(|e| e.message.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_conservation_over_all_small_packets() {
    for mask in 0u32..64 {
        let kinds: Vec<TaskKind> = (0..6)
            .map(|bit| {
                if mask & (1 << bit) != 0 {
                    TaskKind::Math
                } else {
                    TaskKind::Io
                }
            })
            .collect();
        for partitions in 1..=4 {
            let mut driver = driver_for(packet_of(&kinds), partitions, 200);
            if mask % 3 == 0 {
                driver.step().unwrap();
                driver.resize(1).unwrap();
            }
            run_checked(&mut driver);
            assert!(
                driver.is_finished(),
                "mask {:#08b} with {} partitions did not finish",
                mask,
                partitions
            );
            assert_eq!(driver.scheduler().unwrap().ready_list().len(), 6);
        }
    }
}

#[test]
fn test_history_export_is_valid_json() {
    let mut driver = driver_for(Packet::from_records(&[]), 1, 5);
    driver.initialize(alternating_packet(3)).unwrap();
    driver.start().unwrap();

    let json = driver.history().unwrap().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let snapshots = value["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len() as u64, driver.ticks_executed());
}
