// src/workflow/yaml.rs

//! YAML workflow loader and the CSV → YAML converter behind `--to-yaml`.
//!
//! ```text
//! steps: [<name>, ...]        # optional; inferred from first appearance
//! tasks:
//!   - name: <str>             # required, unique
//!     info: <str>             # optional single-line
//!     description: <str>      # optional; replaces info; may be multiline
//!     steps:
//!       <step_name>: <cmd>    # command may be null/empty
//! ```
//!
//! Unknown top-level or per-task keys are rejected.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::errors::{Result, WorkpanelError};
use crate::workflow::model::{StepSpec, TaskSpec, WorkflowSpec};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorkflow {
    #[serde(default)]
    steps: Option<Vec<String>>,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTask {
    name: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// Mapping step name → command. A `serde_yaml::Mapping` (not a
    /// `HashMap`) so that first-appearance order survives for header
    /// inference.
    #[serde(default)]
    steps: Option<Mapping>,
}

pub fn load(path: &Path) -> Result<WorkflowSpec> {
    let contents = fs::read_to_string(path)?;
    let spec = parse(&contents, path)?;
    spec.validate()?;
    Ok(spec)
}

fn parse(contents: &str, path: &Path) -> Result<WorkflowSpec> {
    let raw: RawWorkflow = serde_yaml::from_str(contents)?;

    let headers = match &raw.steps {
        Some(declared) => declared.clone(),
        None => infer_headers(&raw.tasks)?,
    };

    let mut tasks = Vec::new();
    for task in &raw.tasks {
        let info = task
            .description
            .clone()
            .or_else(|| task.info.clone())
            .unwrap_or_default();

        if let Some(mapping) = &task.steps {
            for (key, _) in mapping {
                let key = step_key(key, &task.name)?;
                if !headers.iter().any(|h| h == key) {
                    return Err(WorkpanelError::Workflow(format!(
                        "task '{}' references undeclared step '{}'",
                        task.name, key
                    )));
                }
            }
        }

        let steps = headers
            .iter()
            .map(|header| {
                let command = match task
                    .steps
                    .as_ref()
                    .and_then(|m| m.get(&Value::String(header.clone())))
                {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(cmd)) => cmd.trim().to_string(),
                    Some(other) => {
                        return Err(WorkpanelError::Workflow(format!(
                            "task '{}', step '{}': command must be a string or null, got {:?}",
                            task.name, header, other
                        )))
                    }
                };
                Ok(StepSpec {
                    header: header.clone(),
                    command,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tasks.push(TaskSpec {
            name: task.name.clone(),
            info,
            steps,
        });
    }

    Ok(WorkflowSpec {
        path: path.to_path_buf(),
        headers,
        tasks,
    })
}

/// Step order when the top-level `steps` list is omitted: first appearance
/// across tasks, in task order.
fn infer_headers(tasks: &[RawTask]) -> Result<Vec<String>> {
    let mut headers: Vec<String> = Vec::new();
    for task in tasks {
        if let Some(mapping) = &task.steps {
            for (key, _) in mapping {
                let key = step_key(key, &task.name)?;
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.to_string());
                }
            }
        }
    }
    Ok(headers)
}

fn step_key<'a>(key: &'a Value, task: &str) -> Result<&'a str> {
    key.as_str().ok_or_else(|| {
        WorkpanelError::Workflow(format!(
            "task '{}': step names must be strings, got {:?}",
            task, key
        ))
    })
}

/// Render a workflow back to YAML (used by `--to-yaml`).
///
/// Empty commands are omitted from each task's `steps` mapping; the declared
/// top-level `steps` list keeps the column structure intact.
pub fn to_yaml_string(spec: &WorkflowSpec) -> Result<String> {
    let mut root = Mapping::new();
    root.insert(
        Value::from("steps"),
        Value::Sequence(spec.headers.iter().map(|h| Value::from(h.clone())).collect()),
    );

    let mut tasks = Vec::new();
    for task in &spec.tasks {
        let mut out = Mapping::new();
        out.insert(Value::from("name"), Value::from(task.name.clone()));
        if !task.info.is_empty() {
            let key = if task.info.contains('\n') {
                "description"
            } else {
                "info"
            };
            out.insert(Value::from(key), Value::from(task.info.clone()));
        }
        let mut steps = Mapping::new();
        for step in &task.steps {
            if !step.command.is_empty() {
                steps.insert(
                    Value::from(step.header.clone()),
                    Value::from(step.command.clone()),
                );
            }
        }
        if !steps.is_empty() {
            out.insert(Value::from("steps"), Value::Mapping(steps));
        }
        tasks.push(Value::Mapping(out));
    }
    root.insert(Value::from("tasks"), Value::Sequence(tasks));

    Ok(serde_yaml::to_string(&Value::Mapping(root))?)
}

/// Write the YAML form of `spec` to `path`.
pub fn write_yaml(spec: &WorkflowSpec, path: &Path) -> Result<()> {
    fs::write(path, to_yaml_string(spec)?)?;
    Ok(())
}
