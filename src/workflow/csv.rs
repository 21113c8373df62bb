// src/workflow/csv.rs

//! CSV workflow loader.
//!
//! First record is the header: `TaskName,Info,<step1>,<step2>,...`.
//! Every later record is one task; cells are shell commands, empty cells are
//! no-ops, and missing trailing cells are treated as empty. Multiline cells
//! follow standard CSV quoting.

use std::path::Path;

use csv::ReaderBuilder;

use crate::errors::{Result, WorkpanelError};
use crate::workflow::model::{StepSpec, TaskSpec, WorkflowSpec};

pub fn load(path: &Path) -> Result<WorkflowSpec> {
    let contents = std::fs::read_to_string(path)?;
    let spec = parse(&contents, path)?;
    spec.validate()?;
    Ok(spec)
}

fn parse(contents: &str, path: &Path) -> Result<WorkflowSpec> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        // A blank line parses as a single empty field; skip it.
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        records.push(record);
    }

    let mut iter = records.into_iter();
    let header = iter.next().ok_or_else(|| {
        WorkpanelError::Workflow(format!("workflow '{}' is empty", path.display()))
    })?;

    if header.len() < 2 {
        return Err(WorkpanelError::Workflow(
            "header row must start with TaskName,Info".to_string(),
        ));
    }
    let headers: Vec<String> = header
        .iter()
        .skip(2)
        .map(|h| h.trim().to_string())
        .collect();

    let mut tasks = Vec::new();
    for record in iter {
        if record.len() > header.len() {
            return Err(WorkpanelError::Workflow(format!(
                "row '{}' has {} cells but the header declares {}",
                record.get(0).unwrap_or(""),
                record.len(),
                header.len()
            )));
        }
        let name = record.get(0).unwrap_or("").trim().to_string();
        let info = record.get(1).unwrap_or("").trim().to_string();
        let steps = headers
            .iter()
            .enumerate()
            .map(|(i, h)| StepSpec {
                header: h.clone(),
                // Missing trailing cells read as empty commands.
                command: record.get(i + 2).unwrap_or("").trim().to_string(),
            })
            .collect();
        tasks.push(TaskSpec { name, info, steps });
    }

    Ok(WorkflowSpec {
        path: path.to_path_buf(),
        headers,
        tasks,
    })
}
