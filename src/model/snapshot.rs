// src/model/snapshot.rs

//! Immutable projections of the model for rendering.
//!
//! The view never touches the model lock while drawing: the controller takes
//! a snapshot (a cheap clone of statuses and metadata, not of the tails),
//! releases the lock, and renders from the copy.

use std::time::Duration;

use crate::model::task::{Status, Step, Task};

#[derive(Debug, Clone)]
pub struct StepSnapshot {
    pub header: String,
    pub status: Status,
    pub has_command: bool,
    pub pid: Option<u32>,
    /// Wall-clock time since the step entered `RUNNING`, if it is running.
    pub elapsed: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub name: String,
    pub info: String,
    pub id: String,
    pub generation: u64,
    pub steps: Vec<StepSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub tasks: Vec<TaskSnapshot>,
    pub all_done: bool,
}

impl StepSnapshot {
    pub(crate) fn of(step: &Step) -> Self {
        Self {
            header: step.header.clone(),
            status: step.status,
            has_command: !step.command.is_empty(),
            pid: step.proc.map(|p| p.pid),
            elapsed: match step.status {
                Status::Running => step.started_at.map(|t| t.elapsed()),
                _ => None,
            },
        }
    }
}

impl TaskSnapshot {
    pub(crate) fn of(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            info: task.info.clone(),
            id: task.id.clone(),
            generation: task.generation,
            steps: task.steps.iter().map(StepSnapshot::of).collect(),
        }
    }
}
