#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use workpanel::model::TaskModel;
use workpanel::workflow::{StepSpec, TaskSpec, WorkflowSpec};

/// Builder for `WorkflowSpec` to simplify test setup.
///
/// Headers default to `step0`, `step1`, ... sized to the longest task;
/// shorter tasks are padded with empty (no-op) commands, matching the CSV
/// loader's behavior for missing trailing cells.
pub struct WorkflowBuilder {
    path: PathBuf,
    headers: Option<Vec<String>>,
    tasks: Vec<TaskInput>,
}

struct TaskInput {
    name: String,
    info: String,
    commands: Vec<String>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("tasks.csv"),
            headers: None,
            tasks: Vec::new(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn headers(mut self, headers: &[&str]) -> Self {
        self.headers = Some(headers.iter().map(|h| h.to_string()).collect());
        self
    }

    pub fn with_task(self, name: &str, commands: &[&str]) -> Self {
        self.with_task_info(name, "", commands)
    }

    pub fn with_task_info(mut self, name: &str, info: &str, commands: &[&str]) -> Self {
        self.tasks.push(TaskInput {
            name: name.to_string(),
            info: info.to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> WorkflowSpec {
        let width = self
            .tasks
            .iter()
            .map(|t| t.commands.len())
            .max()
            .unwrap_or(0);
        let headers = self
            .headers
            .unwrap_or_else(|| (0..width).map(|i| format!("step{i}")).collect());

        let tasks = self
            .tasks
            .into_iter()
            .map(|t| TaskSpec {
                name: t.name,
                info: t.info,
                steps: headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| StepSpec {
                        header: h.clone(),
                        command: t.commands.get(i).cloned().unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();

        let spec = WorkflowSpec {
            path: self.path,
            headers,
            tasks,
        };
        spec.validate().expect("builder produced an invalid workflow");
        spec
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A model with no persisted state to reconcile.
pub fn fresh_model(spec: &WorkflowSpec) -> Arc<TaskModel> {
    Arc::new(TaskModel::from_workflow(spec, &HashMap::new()))
}
