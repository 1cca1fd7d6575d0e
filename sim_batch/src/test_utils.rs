//! Test utilities for simulation scenarios
//!
//! Packet builders and run helpers shared by unit and integration tests.

use crate::{SimulationConfig, SimulationDriver};
use core_types::TaskKind;
use packet::{JobRecord, JobType, Packet};

/// Builds a packet from a sequence of task kinds, numbering from 1
pub fn packet_of(kinds: &[TaskKind]) -> Packet {
    let records: Vec<JobRecord> = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let job_type = match kind {
                TaskKind::Math => JobType::Math,
                TaskKind::Io => JobType::Inout,
            };
            JobRecord::new(i as i64 + 1, job_type, 64 * (i as i64 + 1))
        })
        .collect();
    Packet::from_records(&records)
}

/// Builds a packet alternating MATH and INOUT tasks, starting with MATH
pub fn alternating_packet(len: usize) -> Packet {
    let kinds: Vec<TaskKind> = (0..len)
        .map(|i| if i % 2 == 0 { TaskKind::Math } else { TaskKind::Io })
        .collect();
    packet_of(&kinds)
}

/// Creates an initialized driver with an in-memory log
pub fn driver_for(packet: Packet, partitions: usize, max_ticks: u64) -> SimulationDriver {
    let mut driver = SimulationDriver::new(SimulationConfig::new(partitions, max_ticks))
        .expect("test config must be valid");
    driver.initialize(packet).expect("test packet must load");
    driver
}

/// Steps the driver until it stops, checking task conservation after every tick
pub fn run_checked(driver: &mut SimulationDriver) -> u64 {
    let total = driver
        .scheduler()
        .map(|s| s.packet().len())
        .expect("driver must be initialized");
    loop {
        let outcome = driver.step().expect("step must succeed");
        let scheduler = driver.scheduler().expect("driver must be initialized");
        assert_eq!(
            scheduler.accounted_tasks(),
            total,
            "task conservation broken at tick {}",
            scheduler.current_tick()
        );
        if outcome.is_terminal() {
            return driver.ticks_executed();
        }
    }
}
