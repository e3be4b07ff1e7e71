//! Run state tracking
//!
//! Tracks every task of one `run_all` call through
//! `Created → Running → (Succeeded | Failed) → ChannelClosed → Reaped`.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use crate::types::Task;

// ─────────────────────────────────────────────────────────────────
// Task State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Recorded, worker not yet started
    Created,
    /// Worker process started
    Running,
    /// Worker replied with the handler's value
    Succeeded,
    /// Handler failed, worker died, or no reply arrived
    Failed,
    /// Worker's stdout reached EOF
    ChannelClosed,
    /// Worker process waited on
    Reaped,
}

impl TaskState {
    /// Whether moving from `self` to `next` follows the lifecycle
    pub fn can_advance_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Created, Reaped)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Succeeded, ChannelClosed)
                | (Failed, ChannelClosed)
                | (ChannelClosed, Reaped)
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Record
// ─────────────────────────────────────────────────────────────────

/// Bookkeeping for one task of a run
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    /// Position in the submitted list
    pub index: usize,

    /// Correlation id used on the wire
    pub id: Uuid,

    /// Registered handler name
    pub task: String,

    pub state: TaskState,

    /// Worker process id, once started
    pub pid: Option<u32>,

    /// Worker exit code, once reaped (None if killed by a signal)
    pub exit_code: Option<i32>,

    /// Killed after exceeding the task timeout
    pub timed_out: bool,

    /// Slot holds the failure sentinel because the task failed
    pub failed: bool,

    pub submitted_at: DateTime<Utc>,

    #[serde(skip)]
    started_at: Option<Instant>,

    #[serde(skip)]
    reaped_at: Option<Instant>,
}

impl TaskRecord {
    fn new(index: usize, task: &Task) -> Self {
        Self {
            index,
            id: Uuid::new_v4(),
            task: task.name.clone(),
            state: TaskState::Created,
            pid: None,
            exit_code: None,
            timed_out: false,
            failed: false,
            submitted_at: Utc::now(),
            started_at: None,
            reaped_at: None,
        }
    }

    /// Time from worker start to reap
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started_at, self.reaped_at) {
            (Some(start), Some(end)) => Some(end - start),
            (Some(start), None) => Some(start.elapsed()),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Tracker
// ─────────────────────────────────────────────────────────────────

/// Records for all tasks of one run, shared by the collectors
pub struct TaskTracker {
    records: RwLock<Vec<TaskRecord>>,
}

impl TaskTracker {
    pub fn new(tasks: &[Task]) -> Self {
        Self {
            records: RwLock::new(
                tasks
                    .iter()
                    .enumerate()
                    .map(|(index, task)| TaskRecord::new(index, task))
                    .collect(),
            ),
        }
    }

    /// Correlation id of task `index`
    pub fn id(&self, index: usize) -> Option<Uuid> {
        self.records.read().get(index).map(|r| r.id)
    }

    /// Move task `index` to `next`; out-of-order transitions are refused
    pub fn advance(&self, index: usize, next: TaskState) -> bool {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(index) else {
            return false;
        };
        if !record.state.can_advance_to(next) {
            trace!(index, from = ?record.state, to = ?next, "Refused task state transition");
            return false;
        }

        match next {
            TaskState::Running => record.started_at = Some(Instant::now()),
            TaskState::Reaped => record.reaped_at = Some(Instant::now()),
            TaskState::Failed => record.failed = true,
            _ => {}
        }
        record.state = next;
        true
    }

    pub fn mark_running(&self, index: usize, pid: Option<u32>) {
        if self.advance(index, TaskState::Running) {
            self.records.write()[index].pid = pid;
        }
    }

    pub fn mark_reaped(&self, index: usize, exit_code: Option<i32>) {
        if self.advance(index, TaskState::Reaped) {
            self.records.write()[index].exit_code = exit_code;
        }
    }

    pub fn mark_timed_out(&self, index: usize) {
        if let Some(record) = self.records.write().get_mut(index) {
            record.timed_out = true;
        }
    }

    pub fn state(&self, index: usize) -> Option<TaskState> {
        self.records.read().get(index).map(|r| r.state)
    }

    pub fn count_in(&self, state: TaskState) -> usize {
        self.records.read().iter().filter(|r| r.state == state).count()
    }

    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.records.read().clone()
    }
}

// ─────────────────────────────────────────────────────────────────
// Run Report
// ─────────────────────────────────────────────────────────────────

/// Results of a run together with per-task bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Index-aligned results; failures hold the empty-array sentinel
    pub results: Vec<Value>,

    pub records: Vec<TaskRecord>,

    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of tasks whose handler returned a value
    pub fn succeeded(&self) -> usize {
        self.records.len() - self.failed()
    }

    /// Number of tasks whose slot holds a failure
    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.failed).count()
    }

    /// Whether every worker has been waited on
    pub fn all_reaped(&self) -> bool {
        self.records.iter().all(|r| r.state == TaskState::Reaped)
    }
}

fn serialize_millis<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u64(d.as_millis() as u64)
}
