// src/engine/mod.rs

//! Execution engine: a fixed pool of worker threads fed by a FIFO of
//! task-runs.
//!
//! Whole tasks occupy worker slots, so the number of live child processes is
//! bounded by the pool size, and stepping through a task is a plain loop on
//! one thread ([`runner`]). The engine also executes the [`Action`]s the
//! model computes under its lock: enqueueing runs and killing process
//! groups.

pub mod process;
pub mod runner;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::model::{Action, TaskModel, TaskRun};

pub use process::KILL_GRACE;
pub use runner::{stderr_log_path, stdout_log_path};

/// Default logs root, relative to the process cwd.
pub const LOGS_DIR: &str = ".logs";

pub struct Engine {
    queue_tx: Sender<TaskRun>,
    logs_root: PathBuf,
}

impl Engine {
    /// Start `max_workers` worker threads (values below 1 are treated as 1)
    /// and create the logs root.
    ///
    /// Dropping the engine closes the queue; workers exit once they finish
    /// their current run.
    pub fn start(model: Arc<TaskModel>, max_workers: usize, logs_root: PathBuf) -> Result<Engine> {
        let workers = max_workers.max(1);
        fs::create_dir_all(&logs_root)?;

        let (queue_tx, queue_rx) = crossbeam_channel::unbounded::<TaskRun>();
        for n in 0..workers {
            let model = model.clone();
            let rx = queue_rx.clone();
            let root = logs_root.clone();
            thread::Builder::new()
                .name(format!("worker-{n}"))
                .spawn(move || worker_loop(model, rx, root))?;
        }
        info!(workers, logs_root = ?logs_root, "execution engine started");

        Ok(Engine {
            queue_tx,
            logs_root,
        })
    }

    /// Execute the actions a model call returned, now that its lock is
    /// released.
    pub fn apply(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Schedule(run) => {
                    if self.queue_tx.send(run).is_err() {
                        warn!(task = run.task, "worker queue closed; dropping scheduled run");
                    }
                }
                Action::KillGroup { task, step, pgid } => {
                    debug!(task, step, pgid, "kill requested");
                    // The escalation wait must not block the caller.
                    thread::spawn(move || {
                        process::kill_group_with_grace(pgid, process::KILL_GRACE)
                    });
                }
            }
        }
    }

    pub fn logs_root(&self) -> &Path {
        &self.logs_root
    }
}

fn worker_loop(model: Arc<TaskModel>, queue_rx: Receiver<TaskRun>, logs_root: PathBuf) {
    debug!("worker started");
    while let Ok(run) = queue_rx.recv() {
        runner::run_task(&model, &logs_root, run);
    }
    debug!("worker exiting (queue closed)");
}
