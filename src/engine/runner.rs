// src/engine/runner.rs

//! Per-task step loop executed on a worker thread.
//!
//! A worker owns a whole task-run: it walks the steps in order, spawning one
//! process at a time, so intra-task sequentiality needs no scheduler. Every
//! model write goes through a generation-guarded method; when the guard says
//! the run is stale the worker stops without leaving a trace.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::model::{Dispatch, OutputStream, StepOutcome, TaskModel, TaskRun};

use super::process;

/// Stdout log file for a step: `<logs_root>/<task_id>/step-<NN>.stdout.log`.
pub fn stdout_log_path(logs_root: &Path, task_id: &str, step: usize) -> PathBuf {
    logs_root.join(task_id).join(format!("step-{step:02}.stdout.log"))
}

/// Stderr log file for a step.
pub fn stderr_log_path(logs_root: &Path, task_id: &str, step: usize) -> PathBuf {
    logs_root.join(task_id).join(format!("step-{step:02}.stderr.log"))
}

/// Execute one task-run to completion (or until the generation goes stale).
pub fn run_task(model: &Arc<TaskModel>, logs_root: &Path, run: TaskRun) {
    let step_count = model.step_count(run.task);
    debug!(task = run.task, start = run.start_step, generation = run.generation,
           "task-run starting");

    for step in run.start_step..step_count {
        match model.begin_step(run.task, step, run.generation) {
            Dispatch::Abort => {
                debug!(task = run.task, step, generation = run.generation,
                       "stale generation; worker exiting silently");
                return;
            }
            Dispatch::Skip => continue,
            Dispatch::Run { command, task_id } => {
                if !run_step(model, logs_root, &run, step, &task_id, &command) {
                    return;
                }
            }
        }
    }
}

/// Spawn and supervise one step. Returns true when the run should continue
/// with the next step.
fn run_step(
    model: &Arc<TaskModel>,
    logs_root: &Path,
    run: &TaskRun,
    step: usize,
    task_id: &str,
    command: &str,
) -> bool {
    let stdout_path = stdout_log_path(logs_root, task_id, step);
    let stderr_path = stderr_log_path(logs_root, task_id, step);
    if let Err(err) = fs::create_dir_all(logs_root.join(task_id)) {
        return model.fail_spawn(
            run.task,
            step,
            run.generation,
            &format!("creating log directory: {err}"),
        );
    }

    let mut child = match process::spawn_in_group(command) {
        Ok(child) => child,
        Err(err) => {
            // Leave the diagnostic where the output would have gone too.
            let _ = fs::write(&stderr_path, format!("spawn failed: {err}\n"));
            return model.fail_spawn(run.task, step, run.generation, &err.to_string());
        }
    };

    let pid = child.id();
    let pgid = pid as i32;

    if !model.attach_process(run.task, step, run.generation, pid, pgid) {
        // Cancelled between spawn and attach: reap without recording anything.
        debug!(pid, "generation advanced during spawn; killing orphan group");
        process::kill_group(pgid);
        let _ = child.wait();
        return false;
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_handle = stdout.map(|src| {
        spawn_streamer(model.clone(), *run, step, OutputStream::Stdout, src, stdout_path)
    });
    let err_handle = stderr.map(|src| {
        spawn_streamer(model.clone(), *run, step, OutputStream::Stderr, src, stderr_path)
    });

    let wait_result = child.wait();

    if let Some(handle) = out_handle {
        let _ = handle.join();
    }
    if let Some(handle) = err_handle {
        let _ = handle.join();
    }

    let outcome = match wait_result {
        Ok(status) => status_to_outcome(status),
        Err(err) => {
            warn!(task = run.task, step, error = %err, "wait on child failed");
            return model.fail_spawn(run.task, step, run.generation, &format!("wait failed: {err}"));
        }
    };

    model.finish_step(run.task, step, run.generation, outcome)
}

fn status_to_outcome(status: std::process::ExitStatus) -> StepOutcome {
    use std::os::unix::process::ExitStatusExt;

    match status.code() {
        Some(code) => StepOutcome::Exited(code),
        None => StepOutcome::Signaled(status.signal().unwrap_or(0)),
    }
}

/// One streaming thread per pipe: lines go to the step's log file and into
/// the bounded in-memory tail. The file is truncated here, so each rerun of
/// a step starts its logs over. Stops early when the model reports the
/// generation stale.
fn spawn_streamer<R>(
    model: Arc<TaskModel>,
    run: TaskRun,
    step: usize,
    stream: OutputStream,
    src: R,
    log_path: PathBuf,
) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let file = match File::create(&log_path) {
            Ok(f) => f,
            Err(err) => {
                warn!(path = ?log_path, error = %err, "cannot open step log file");
                let _ = model.append_debug(
                    run.task,
                    step,
                    run.generation,
                    &format!("cannot open log file {}: {err}", log_path.display()),
                );
                // Still drain the pipe so the child never blocks on a full
                // buffer.
                for _ in BufReader::new(src).lines() {}
                return;
            }
        };

        let mut writer = BufWriter::new(file);
        let reader = BufReader::new(src);
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    debug!(error = %err, "stream read error");
                    break;
                }
            };
            // A write error to the log file is not fatal; the tail keeps flowing.
            let _ = writeln!(writer, "{line}");
            if !model.append_output(run.task, step, run.generation, stream, &line) {
                break;
            }
        }
        let _ = writer.flush();
    })
}
