// src/lib.rs

pub mod cli;
pub mod engine;
pub mod errors;
pub mod exit_codes;
pub mod logging;
pub mod model;
pub mod state;
pub mod ui;
pub mod workflow;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::cli::CliArgs;
use crate::engine::{Engine, LOGS_DIR};
use crate::errors::Result;
use crate::model::TaskModel;
use crate::state::StateStore;
use crate::ui::App;
use crate::workflow::WorkflowSpec;

/// High-level entry point used by `main.rs` once the workflow is loaded.
///
/// This wires together:
/// - the state store (resume + flush)
/// - the task model, reconciled against persisted state
/// - the worker-pool engine
/// - the dashboard controller
pub fn run(spec: WorkflowSpec, args: &CliArgs) -> Result<()> {
    let workers = args.effective_workers();
    let title = args
        .title
        .clone()
        .unwrap_or_else(|| format!("workpanel - {}", spec.path.display()));

    let store = StateStore::for_workflow(&spec.path);
    let hashes = TaskModel::structural_hashes(&spec);
    let persisted = store.load(&hashes);
    info!(
        tasks = spec.tasks.len(),
        resumed = persisted.len(),
        workers,
        "workflow loaded"
    );

    let model = Arc::new(TaskModel::from_workflow(&spec, &persisted));
    let engine = Engine::start(model.clone(), workers, PathBuf::from(LOGS_DIR))?;

    App::new(model, engine, store, title).run()
}
