// src/workflow/model.rs

//! In-memory workflow descriptors produced by the loaders.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::errors::{Result, WorkpanelError};

/// One shell-command step of a task, paired with its column header.
///
/// An empty command means "no-op": the step is skipped without spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub header: String,
    pub command: String,
}

/// One workflow row: a named task with an ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub info: String,
    pub steps: Vec<StepSpec>,
}

/// A parsed workflow file.
#[derive(Debug, Clone)]
pub struct WorkflowSpec {
    /// Path the workflow was loaded from; the state file is its sibling.
    pub path: PathBuf,
    /// Step column headers, shared by all tasks.
    pub headers: Vec<String>,
    pub tasks: Vec<TaskSpec>,
}

impl WorkflowSpec {
    /// Validate cross-task constraints common to both loaders.
    ///
    /// Task names must be unique: the stable task id is derived from
    /// `name` + `info`, and duplicate names would collide in log paths
    /// and the persisted state map.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(WorkpanelError::Workflow(
                    "task with empty name".to_string(),
                ));
            }
            if !seen.insert(task.name.as_str()) {
                return Err(WorkpanelError::Workflow(format!(
                    "duplicate task name: '{}'",
                    task.name
                )));
            }
            if task.steps.len() != self.headers.len() {
                return Err(WorkpanelError::Workflow(format!(
                    "task '{}' has {} steps but the workflow declares {} columns",
                    task.name,
                    task.steps.len(),
                    self.headers.len()
                )));
            }
        }
        Ok(())
    }
}
