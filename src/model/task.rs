// src/model/task.rs

//! Task and step runtime state, stable ids, and structural hashing.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::workflow::{StepSpec, TaskSpec};

/// Bound on the in-memory output tail per step. Full output lives in the
/// on-disk log files.
pub const OUTPUT_TAIL_CAP: usize = 2000;
/// Bound on the in-memory debug log per step.
pub const DEBUG_TAIL_CAP: usize = 100;

/// Lifecycle state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Running,
    Success,
    Failed,
    Killed,
    Skipped,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Success | Status::Failed | Status::Killed | Status::Skipped
        )
    }

    /// Display form matching the persisted spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
            Status::Killed => "KILLED",
            Status::Skipped => "SKIPPED",
        }
    }
}

/// Append-only ring of recent lines, truncated from the front.
#[derive(Debug, Clone)]
pub struct TailBuffer {
    lines: VecDeque<String>,
    cap: usize,
}

impl TailBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            cap,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.cap == 0 {
            return;
        }
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// Transient handle to the live child of a `RUNNING` step.
#[derive(Debug, Clone, Copy)]
pub struct RunningProc {
    pub pid: u32,
    /// Process group id; equal to the pid because the child calls `setsid`.
    pub pgid: i32,
}

/// One shell-command step plus its runtime state.
#[derive(Debug)]
pub struct Step {
    pub header: String,
    pub command: String,
    pub status: Status,
    pub output_tail: TailBuffer,
    pub debug_tail: TailBuffer,
    /// Present exactly while the step is `RUNNING`.
    pub proc: Option<RunningProc>,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
}

impl Step {
    pub fn from_spec(spec: &StepSpec) -> Self {
        Self {
            header: spec.header.clone(),
            command: spec.command.clone(),
            status: Status::Pending,
            output_tail: TailBuffer::new(OUTPUT_TAIL_CAP),
            debug_tail: TailBuffer::new(DEBUG_TAIL_CAP),
            proc: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Reset to a fresh `PENDING` state for a rerun. The debug tail is kept
    /// so the history of kills/reruns stays inspectable.
    pub fn reset(&mut self) {
        self.status = Status::Pending;
        self.output_tail.clear();
        self.proc = None;
        self.started_at = None;
        self.ended_at = None;
    }
}

/// One workflow row and its execution state.
#[derive(Debug)]
pub struct Task {
    pub name: String,
    pub info: String,
    /// Stable id used in log paths; invariant under row reordering.
    pub id: String,
    /// Digest of the ordered (header, command) sequence; decides whether
    /// persisted state still applies.
    pub structural_hash: String,
    pub steps: Vec<Step>,
    /// Run counter: bumped on every rerun/kill/shutdown. A worker holding a
    /// stale value must not mutate this task.
    pub generation: u64,
}

impl Task {
    pub fn from_spec(spec: &TaskSpec) -> Self {
        Self {
            name: spec.name.clone(),
            info: spec.info.clone(),
            id: task_id(&spec.name, &spec.info),
            structural_hash: structural_hash(&spec.steps),
            steps: spec.steps.iter().map(Step::from_spec).collect(),
            generation: 0,
        }
    }

    /// Index of the first non-terminal step: the progress frontier.
    /// `None` when every step is terminal (or there are none).
    pub fn frontier(&self) -> Option<usize> {
        self.steps.iter().position(|s| !s.status.is_terminal())
    }

    /// Index of the step currently `RUNNING`, if any. At most one exists.
    pub fn running_step(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == Status::Running)
    }

    pub fn is_done(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }
}

/// Stable task id: `<sanitized_name>_<short_hash>` where the short hash is
/// the first 8 hex chars of a digest of `name || info`. Reordering rows in
/// the workflow file does not change it, so log paths stay put.
pub fn task_id(name: &str, info: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0x1f]);
    hasher.update(info.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("{}_{}", sanitize(name), &hex.as_str()[..8])
}

/// Digest over the ordered (header, command) pairs of a task. Editing a
/// command or renaming a column changes the hash and invalidates only that
/// task's persisted state.
pub fn structural_hash(steps: &[StepSpec]) -> String {
    let mut hasher = blake3::Hasher::new();
    for step in steps {
        hasher.update(step.header.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(step.command.as_bytes());
        hasher.update(&[0x1e]);
    }
    hasher.finalize().to_hex().to_string()
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "task".to_string()
    } else {
        cleaned
    }
}
