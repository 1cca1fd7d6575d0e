//! Job packet format and loader.
//!
//! A packet is the ordered batch of jobs for one simulation run. It is read
//! from a JSON job descriptor, validated as a whole, and never changes after
//! loading: the scheduler works on its own copy of the tasks.
//!
//! ## Descriptor format
//!
//! ```json
//! { "tasks": [ { "num": 1, "type": "MATH", "memory": 100 },
//!              { "num": 2, "type": "INOUT", "memory": 50 } ] }
//! ```
//!
//! A bare top-level array of records is accepted as well.

use core_types::{Task, TaskId, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Job type as spelled in the descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobType {
    Math,
    Inout,
}

impl From<JobType> for TaskKind {
    fn from(value: JobType) -> Self {
        match value {
            JobType::Math => TaskKind::Math,
            JobType::Inout => TaskKind::Io,
        }
    }
}

/// One job record of the descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    pub num: i64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub memory: i64,
}

impl JobRecord {
    /// Creates a record from its three descriptor fields.
    pub const fn new(num: i64, job_type: JobType, memory: i64) -> Self {
        Self {
            num,
            job_type,
            memory,
        }
    }

    /// Creates a MATH record.
    pub const fn math(num: i64, memory: i64) -> Self {
        Self::new(num, JobType::Math, memory)
    }

    /// Creates an INOUT record.
    pub const fn inout(num: i64, memory: i64) -> Self {
        Self::new(num, JobType::Inout, memory)
    }
}

/// Classification of a packet by its job mix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PacketKind {
    MathHeavy,
    IoHeavy,
    Balanced,
}

impl PacketKind {
    /// Classifies a job mix: equal counts are balanced, otherwise the larger side wins.
    pub fn classify(math: usize, io: usize) -> Self {
        if math == io {
            PacketKind::Balanced
        } else if math > io {
            PacketKind::MathHeavy
        } else {
            PacketKind::IoHeavy
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::MathHeavy => write!(f, "COMPUTE"),
            PacketKind::IoHeavy => write!(f, "INPUT/OUTPUT"),
            PacketKind::Balanced => write!(f, "BALANCED"),
        }
    }
}

/// Errors related to loading a job descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Failed to read descriptor: {0}")]
    Io(String),

    #[error("Failed to parse descriptor: {0}")]
    Parse(String),

    #[error("Descriptor has no task list")]
    MissingTasks,

    #[error("Invalid job record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// An ordered, immutable batch of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    tasks: Vec<Task>,
    kind: Option<PacketKind>,
}

impl Packet {
    /// Builds a packet from records, assigning task IDs in record order.
    pub fn from_records(records: &[JobRecord]) -> Self {
        let tasks: Vec<Task> = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                Task::new(
                    TaskId::from_index(index),
                    record.num,
                    record.job_type.into(),
                    record.memory,
                )
            })
            .collect();

        let kind = if tasks.is_empty() {
            None
        } else {
            let math = tasks.iter().filter(|t| t.kind() == TaskKind::Math).count();
            Some(PacketKind::classify(math, tasks.len() - math))
        };

        Self { tasks, kind }
    }

    /// Parses a descriptor. Either every record is valid or nothing is built.
    pub fn from_json_str(data: &str) -> Result<Self, LoadError> {
        let value: Value =
            serde_json::from_str(data).map_err(|err| LoadError::Parse(err.to_string()))?;

        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("tasks") {
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    return Err(LoadError::Parse("\"tasks\" must be an array".to_string()))
                }
                None => return Err(LoadError::MissingTasks),
            },
            _ => {
                return Err(LoadError::Parse(
                    "descriptor must be an object or an array".to_string(),
                ))
            }
        };

        let records = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value::<JobRecord>(entry).map_err(|err| {
                    LoadError::InvalidRecord {
                        index,
                        reason: err.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_records(&records))
    }

    /// Reads and parses a descriptor file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let data =
            fs::read_to_string(path.as_ref()).map_err(|err| LoadError::Io(err.to_string()))?;
        Self::from_json_str(&data)
    }

    /// Tasks in descriptor order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True for a packet with no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Classification computed at load time; `None` for an empty packet.
    pub fn kind(&self) -> Option<PacketKind> {
        self.kind
    }

    /// Number of MATH tasks.
    pub fn math_count(&self) -> usize {
        self.count_kind(TaskKind::Math)
    }

    /// Number of INOUT tasks.
    pub fn io_count(&self) -> usize {
        self.count_kind(TaskKind::Io)
    }

    /// Sum of declared memory demand in MB (reporting only), saturating.
    pub fn total_memory(&self) -> i64 {
        self.tasks
            .iter()
            .fold(0i64, |total, t| total.saturating_add(t.memory()))
    }

    /// Rebuilds the descriptor records, e.g. for saving a packet back out.
    pub fn records(&self) -> Vec<JobRecord> {
        self.tasks
            .iter()
            .map(|task| {
                let job_type = match task.kind() {
                    TaskKind::Math => JobType::Math,
                    TaskKind::Io => JobType::Inout,
                };
                JobRecord::new(task.number(), job_type, task.memory())
            })
            .collect()
    }

    fn count_kind(&self, kind: TaskKind) -> usize {
        self.tasks.iter().filter(|t| t.kind() == kind).count()
    }
}
