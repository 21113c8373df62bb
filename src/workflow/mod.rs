// src/workflow/mod.rs

//! Workflow file loading.
//!
//! A workflow is an ordered list of named tasks, each an ordered list of
//! shell-command steps under shared column headers. Two on-disk forms are
//! supported:
//!
//! - CSV: header row `TaskName,Info,<step1>,...`, one task per row
//!   ([`csv`] submodule)
//! - YAML: explicit `steps` list plus per-task step mappings
//!   ([`yaml`] submodule)
//!
//! The loaders only produce in-memory descriptors; ids, hashes, and runtime
//! state are derived later by the model.

pub mod csv;
pub mod model;
pub mod yaml;

use std::path::Path;

use crate::errors::Result;

pub use model::{StepSpec, TaskSpec, WorkflowSpec};

/// Load a workflow from `path`, dispatching on the file extension:
/// `.yaml` / `.yml` parse as YAML, everything else as CSV.
pub fn load(path: &Path) -> Result<WorkflowSpec> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => yaml::load(path),
        _ => csv::load(path),
    }
}
