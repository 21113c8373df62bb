// src/model/mod.rs

//! The task model: single point of truth for task/step state.
//!
//! All mutation flows through one mutex. Methods that need to trigger IO
//! (killing a process group, scheduling a task-run) never perform it while
//! holding the lock; they return [`Action`]s for the engine to execute after
//! the lock is released. This split is what keeps a status transition that
//! schedules follow-up work from deadlocking on its own lock.
//!
//! Every mutation coming from a worker is guarded by the task's generation
//! counter: `rerun`, `kill`, and shutdown bump it, and a worker that captured
//! an older value gets a no-op. That guard is the only defense against a
//! previously-cancelled worker still draining its child's output while a new
//! run is already writing.

pub mod snapshot;
pub mod task;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, warn};

use crate::state::{PersistedState, PersistedTask, STATE_VERSION};
use crate::workflow::WorkflowSpec;

pub use snapshot::{ModelSnapshot, StepSnapshot, TaskSnapshot};
pub use task::{Status, Task};

use task::RunningProc;

/// A unit of work for the engine's queue: run one task's steps starting at
/// `start_step`, on behalf of generation `generation`.
#[derive(Debug, Clone, Copy)]
pub struct TaskRun {
    pub task: usize,
    pub start_step: usize,
    pub generation: u64,
}

/// IO the engine must perform on the model's behalf, computed under the lock
/// and executed after it is released.
#[derive(Debug)]
pub enum Action {
    /// Enqueue a fresh task-run on the worker pool.
    Schedule(TaskRun),
    /// Terminate a live process group (SIGTERM, escalating to SIGKILL).
    KillGroup { task: usize, step: usize, pgid: i32 },
}

/// What a worker should do with the step it is about to dispatch.
#[derive(Debug)]
pub enum Dispatch {
    /// Spawn this command.
    Run { command: String, task_id: String },
    /// Step needs no process (empty command, or already skipped); continue
    /// with the next step.
    Skip,
    /// The worker's generation is stale; exit without touching anything.
    Abort,
}

/// How a child process ended.
#[derive(Debug, Clone, Copy)]
pub enum StepOutcome {
    Exited(i32),
    Signaled(i32),
}

pub struct TaskModel {
    state: Mutex<Vec<Task>>,
    /// Redraw handshake with the controller: set on every visible mutation,
    /// cleared when the controller picks it up.
    dirty: AtomicBool,
}

impl TaskModel {
    /// Build the model from a parsed workflow, reconciling with whatever the
    /// state store recovered for the same structural hashes.
    ///
    /// Reconciliation rules, per task found in `persisted`:
    /// - `SUCCESS`, `FAILED`, `SKIPPED`, `PENDING` are preserved;
    /// - `RUNNING` and `KILLED` reset to `PENDING` (the step was interrupted);
    /// - persisted steps beyond the current step count are dropped;
    /// - steps missing from the record stay `PENDING`.
    pub fn from_workflow(
        spec: &WorkflowSpec,
        persisted: &HashMap<String, PersistedTask>,
    ) -> Self {
        let mut tasks: Vec<Task> = spec.tasks.iter().map(Task::from_spec).collect();

        for task in &mut tasks {
            let Some(record) = persisted.get(&task.id) else {
                continue;
            };
            debug!(task = %task.name, "resuming persisted state");
            for (i, status) in record.steps.iter().enumerate() {
                if i >= task.steps.len() {
                    break;
                }
                task.steps[i].status = match status {
                    Status::Running | Status::Killed => Status::Pending,
                    other => *other,
                };
            }
        }

        Self {
            state: Mutex::new(tasks),
            dirty: AtomicBool::new(true),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> ModelSnapshot {
        let tasks = self.state.lock().unwrap();
        ModelSnapshot {
            tasks: tasks.iter().map(TaskSnapshot::of).collect(),
            all_done: tasks.iter().all(Task::is_done),
        }
    }

    pub fn all_done(&self) -> bool {
        self.state.lock().unwrap().iter().all(Task::is_done)
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    pub fn step_count(&self, task: usize) -> usize {
        let tasks = self.state.lock().unwrap();
        tasks.get(task).map(|t| t.steps.len()).unwrap_or(0)
    }

    pub fn status_of(&self, task: usize, step: usize) -> Option<Status> {
        let tasks = self.state.lock().unwrap();
        tasks.get(task)?.steps.get(step).map(|s| s.status)
    }

    pub fn statuses(&self, task: usize) -> Vec<Status> {
        let tasks = self.state.lock().unwrap();
        tasks
            .get(task)
            .map(|t| t.steps.iter().map(|s| s.status).collect())
            .unwrap_or_default()
    }

    pub fn generation(&self, task: usize) -> u64 {
        let tasks = self.state.lock().unwrap();
        tasks.get(task).map(|t| t.generation).unwrap_or(0)
    }

    pub fn task_id(&self, task: usize) -> Option<String> {
        let tasks = self.state.lock().unwrap();
        tasks.get(task).map(|t| t.id.clone())
    }

    /// Clone of the step's output tail (most recent lines last).
    pub fn output_tail(&self, task: usize, step: usize) -> Vec<String> {
        let tasks = self.state.lock().unwrap();
        tasks
            .get(task)
            .and_then(|t| t.steps.get(step))
            .map(|s| s.output_tail.to_vec())
            .unwrap_or_default()
    }

    /// Clone of the step's debug log tail.
    pub fn debug_tail(&self, task: usize, step: usize) -> Vec<String> {
        let tasks = self.state.lock().unwrap();
        tasks
            .get(task)
            .and_then(|t| t.steps.get(step))
            .map(|s| s.debug_tail.to_vec())
            .unwrap_or_default()
    }

    /// True once the controller should redraw; clears the flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Scheduling entry points (controller side)
    // -----------------------------------------------------------------------

    /// Task-runs to enqueue at startup: every task whose progress frontier
    /// exists and whose earlier steps all succeeded gets a run starting at
    /// the frontier. Fully-terminal tasks (and zero-step tasks) get nothing.
    pub fn startup_actions(&self) -> Vec<Action> {
        let mut tasks = self.state.lock().unwrap();
        let mut actions = Vec::new();
        for (idx, task) in tasks.iter_mut().enumerate() {
            let Some(frontier) = task.frontier() else {
                continue;
            };
            let prefix_ok = task.steps[..frontier]
                .iter()
                .all(|s| s.status == Status::Success);
            if !prefix_ok {
                continue;
            }
            task.generation += 1;
            debug!(task = %task.name, start = frontier, generation = task.generation,
                   "scheduling task at startup");
            actions.push(Action::Schedule(TaskRun {
                task: idx,
                start_step: frontier,
                generation: task.generation,
            }));
        }
        actions
    }

    /// Rerun `task` from `step` onward.
    ///
    /// Bumps the generation (cancelling any live run), terminates the active
    /// process group if there is one, resets `step..end` to `PENDING`, and
    /// schedules a fresh run. Steps before `step` are untouched. The start
    /// index is clamped to the progress frontier so a run never begins past
    /// an unfinished step.
    pub fn rerun(&self, task_idx: usize, step_idx: usize) -> Vec<Action> {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return Vec::new();
        };
        if task.steps.is_empty() || step_idx >= task.steps.len() {
            return Vec::new();
        }

        let start = match task.frontier() {
            Some(f) => step_idx.min(f),
            None => step_idx,
        };

        task.generation += 1;
        let generation = task.generation;
        let mut actions = Vec::new();

        if let Some(running) = task.running_step() {
            if let Some(proc) = task.steps[running].proc {
                actions.push(Action::KillGroup {
                    task: task_idx,
                    step: running,
                    pgid: proc.pgid,
                });
            }
        }

        for step in &mut task.steps[start..] {
            step.reset();
        }
        push_debug(task, start, format!("rerun requested (generation {generation})"));
        debug!(task = %task.name, start, generation, "rerun");

        actions.push(Action::Schedule(TaskRun {
            task: task_idx,
            start_step: start,
            generation,
        }));
        drop(tasks);
        self.mark_dirty();
        actions
    }

    /// Kill the task's active run.
    ///
    /// Bumps the generation so the draining worker exits silently, terminates
    /// the live process group, and commits `KILLED` for the step that was
    /// running. Other steps are left as-is.
    pub fn kill(&self, task_idx: usize) -> Vec<Action> {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return Vec::new();
        };

        task.generation += 1;
        let generation = task.generation;
        let mut actions = Vec::new();

        if let Some(running) = task.running_step() {
            let step = &mut task.steps[running];
            if let Some(proc) = step.proc.take() {
                actions.push(Action::KillGroup {
                    task: task_idx,
                    step: running,
                    pgid: proc.pgid,
                });
            }
            step.status = Status::Killed;
            step.ended_at = Some(Instant::now());
            push_debug(task, running, format!("killed by user (generation {generation})"));
            debug!(task = %task.name, step = running, generation, "kill");
        } else {
            push_debug(task, 0, format!("kill requested; nothing running (generation {generation})"));
        }

        drop(tasks);
        self.mark_dirty();
        actions
    }

    /// Tear down for exit: cancel every live run and commit `KILLED` for
    /// whatever was running. Returns the kill actions for the engine.
    pub fn shutdown(&self) -> Vec<Action> {
        let mut tasks = self.state.lock().unwrap();
        let mut actions = Vec::new();
        for (idx, task) in tasks.iter_mut().enumerate() {
            task.generation += 1;
            if let Some(running) = task.running_step() {
                let step = &mut task.steps[running];
                if let Some(proc) = step.proc.take() {
                    actions.push(Action::KillGroup {
                        task: idx,
                        step: running,
                        pgid: proc.pgid,
                    });
                }
                step.status = Status::Killed;
                step.ended_at = Some(Instant::now());
                push_debug(task, running, "killed on shutdown".to_string());
            }
        }
        drop(tasks);
        self.mark_dirty();
        actions
    }

    // -----------------------------------------------------------------------
    // Worker-side transitions (all generation-guarded)
    // -----------------------------------------------------------------------

    /// Called by a worker before each step of its run.
    pub fn begin_step(&self, task_idx: usize, step_idx: usize, generation: u64) -> Dispatch {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return Dispatch::Abort;
        };
        if task.generation != generation {
            return Dispatch::Abort;
        }
        let task_id = task.id.clone();
        let Some(step) = task.steps.get_mut(step_idx) else {
            return Dispatch::Abort;
        };

        match step.status {
            // A prior failure in this run marked the rest SKIPPED.
            Status::Skipped => return Dispatch::Skip,
            Status::Pending => {}
            other => {
                warn!(task = %task.name, step = step_idx, status = other.as_str(),
                      "dispatch hit a step that is not PENDING");
                return Dispatch::Abort;
            }
        }

        if step.command.is_empty() {
            step.status = Status::Skipped;
            step.ended_at = Some(Instant::now());
            push_debug(task, step_idx, "empty command; skipped".to_string());
            drop(tasks);
            self.mark_dirty();
            return Dispatch::Skip;
        }

        step.status = Status::Running;
        step.started_at = Some(Instant::now());
        step.ended_at = None;
        let command = step.command.clone();
        push_debug(task, step_idx, format!("starting step (generation {generation})"));
        drop(tasks);
        self.mark_dirty();
        Dispatch::Run { command, task_id }
    }

    /// Record the spawned child. Returns false when the generation went stale
    /// between spawn and attach; the caller must then kill the group itself.
    pub fn attach_process(
        &self,
        task_idx: usize,
        step_idx: usize,
        generation: u64,
        pid: u32,
        pgid: i32,
    ) -> bool {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return false;
        };
        if task.generation != generation {
            return false;
        }
        if let Some(step) = task.steps.get_mut(step_idx) {
            step.proc = Some(RunningProc { pid, pgid });
            push_debug(task, step_idx, format!("process started with pid {pid}"));
        }
        drop(tasks);
        self.mark_dirty();
        true
    }

    /// Append one tailed output line. Returns false (and writes nothing) when
    /// the generation is stale, which also tells the streamer to stop.
    pub fn append_output(
        &self,
        task_idx: usize,
        step_idx: usize,
        generation: u64,
        stream: OutputStream,
        line: &str,
    ) -> bool {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return false;
        };
        if task.generation != generation {
            return false;
        }
        if let Some(step) = task.steps.get_mut(step_idx) {
            let tagged = match stream {
                OutputStream::Stdout => line.to_string(),
                OutputStream::Stderr => format!("[stderr] {line}"),
            };
            step.output_tail.push(tagged);
        }
        drop(tasks);
        self.mark_dirty();
        true
    }

    /// Append a debug-log line; no-op when the generation is stale.
    pub fn append_debug(
        &self,
        task_idx: usize,
        step_idx: usize,
        generation: u64,
        message: &str,
    ) -> bool {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return false;
        };
        if task.generation != generation {
            return false;
        }
        push_debug(task, step_idx, message.to_string());
        drop(tasks);
        self.mark_dirty();
        true
    }

    /// Commit the step's terminal status after its process exited.
    ///
    /// Returns true when the worker should continue with the next step. On a
    /// non-success the remaining `PENDING` steps are marked `SKIPPED` and the
    /// run stops. A stale generation writes nothing and stops the run.
    pub fn finish_step(
        &self,
        task_idx: usize,
        step_idx: usize,
        generation: u64,
        outcome: StepOutcome,
    ) -> bool {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return false;
        };
        if task.generation != generation {
            return false;
        }
        let Some(step) = task.steps.get_mut(step_idx) else {
            return false;
        };

        step.proc = None;
        step.ended_at = Some(Instant::now());
        let duration = step
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let status = match outcome {
            StepOutcome::Exited(0) => Status::Success,
            StepOutcome::Exited(_) => Status::Failed,
            StepOutcome::Signaled(_) => Status::Killed,
        };
        step.status = status;

        let detail = match outcome {
            StepOutcome::Exited(code) => format!(
                "process exited with code {code}; status {}; {duration:.2}s",
                status.as_str()
            ),
            StepOutcome::Signaled(sig) => format!(
                "process terminated by signal {sig}; status {}; {duration:.2}s",
                status.as_str()
            ),
        };
        push_debug(task, step_idx, detail);

        let proceed = status == Status::Success;
        if !proceed {
            for later in &mut task.steps[step_idx + 1..] {
                if later.status == Status::Pending {
                    later.status = Status::Skipped;
                }
            }
        }
        drop(tasks);
        self.mark_dirty();
        proceed
    }

    /// Record a spawn failure: the step becomes `FAILED`, later steps are
    /// skipped. Returns false when the generation was stale.
    pub fn fail_spawn(
        &self,
        task_idx: usize,
        step_idx: usize,
        generation: u64,
        error: &str,
    ) -> bool {
        let mut tasks = self.state.lock().unwrap();
        let Some(task) = tasks.get_mut(task_idx) else {
            return false;
        };
        if task.generation != generation {
            return false;
        }
        let Some(step) = task.steps.get_mut(step_idx) else {
            return false;
        };
        step.proc = None;
        step.status = Status::Failed;
        step.ended_at = Some(Instant::now());
        push_debug(task, step_idx, format!("spawn failed: {error}"));
        for later in &mut task.steps[step_idx + 1..] {
            if later.status == Status::Pending {
                later.status = Status::Skipped;
            }
        }
        drop(tasks);
        self.mark_dirty();
        false
    }

    // -----------------------------------------------------------------------
    // Persistence projection
    // -----------------------------------------------------------------------

    /// The full projection the state store writes: per task id, structural
    /// hash and step statuses.
    pub fn persisted(&self) -> PersistedState {
        let tasks = self.state.lock().unwrap();
        PersistedState {
            version: STATE_VERSION,
            tasks: tasks
                .iter()
                .map(|t| {
                    (
                        t.id.clone(),
                        PersistedTask {
                            structural_hash: t.structural_hash.clone(),
                            steps: t.steps.iter().map(|s| s.status).collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Map of task id → structural hash for the store's selective load.
    pub fn structural_hashes(spec: &WorkflowSpec) -> HashMap<String, String> {
        spec.tasks
            .iter()
            .map(|t| {
                (
                    task::task_id(&t.name, &t.info),
                    task::structural_hash(&t.steps),
                )
            })
            .collect()
    }
}

/// Which stream a tailed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

fn push_debug(task: &mut Task, step_idx: usize, message: String) {
    if let Some(step) = task.steps.get_mut(step_idx) {
        step.debug_tail.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepSpec, TaskSpec};
    use std::path::PathBuf;

    fn spec(commands: &[&[&str]]) -> WorkflowSpec {
        let max = commands.iter().map(|c| c.len()).max().unwrap_or(0);
        let headers: Vec<String> = (0..max).map(|i| format!("step{i}")).collect();
        let tasks = commands
            .iter()
            .enumerate()
            .map(|(i, cmds)| TaskSpec {
                name: format!("task{i}"),
                info: String::new(),
                steps: headers
                    .iter()
                    .enumerate()
                    .map(|(j, h)| StepSpec {
                        header: h.clone(),
                        command: cmds.get(j).unwrap_or(&"").to_string(),
                    })
                    .collect(),
            })
            .collect();
        WorkflowSpec {
            path: PathBuf::from("tasks.csv"),
            headers,
            tasks,
        }
    }

    fn fresh(commands: &[&[&str]]) -> TaskModel {
        TaskModel::from_workflow(&spec(commands), &HashMap::new())
    }

    fn schedule_of(actions: &[Action]) -> TaskRun {
        actions
            .iter()
            .find_map(|a| match a {
                Action::Schedule(run) => Some(*run),
                _ => None,
            })
            .expect("no schedule action")
    }

    #[test]
    fn startup_schedules_pending_tasks_at_frontier() {
        let model = fresh(&[&["echo 1", "echo 2"], &["echo 3"]]);
        let actions = model.startup_actions();
        assert_eq!(actions.len(), 2);
        let run = schedule_of(&actions[..1]);
        assert_eq!(run.start_step, 0);
        assert_eq!(run.generation, 1);
    }

    #[test]
    fn startup_skips_fully_terminal_tasks() {
        let mut persisted = HashMap::new();
        let spec = spec(&[&["echo 1"]]);
        let hash = task::structural_hash(&spec.tasks[0].steps);
        persisted.insert(
            task::task_id("task0", ""),
            PersistedTask {
                structural_hash: hash,
                steps: vec![Status::Success],
            },
        );
        let model = TaskModel::from_workflow(&spec, &persisted);
        assert!(model.startup_actions().is_empty());
        assert!(model.all_done());
    }

    #[test]
    fn resume_resets_interrupted_steps() {
        let spec = spec(&[&["a", "b", "c", "d"]]);
        let hash = task::structural_hash(&spec.tasks[0].steps);
        let mut persisted = HashMap::new();
        persisted.insert(
            task::task_id("task0", ""),
            PersistedTask {
                structural_hash: hash,
                steps: vec![Status::Success, Status::Success, Status::Running, Status::Pending],
            },
        );
        let model = TaskModel::from_workflow(&spec, &persisted);
        assert_eq!(
            model.statuses(0),
            vec![Status::Success, Status::Success, Status::Pending, Status::Pending]
        );
        // Resume starts exactly at the interrupted step.
        let run = schedule_of(&model.startup_actions());
        assert_eq!(run.start_step, 2);
    }

    #[test]
    fn resume_drops_excess_persisted_steps() {
        let spec = spec(&[&["a"]]);
        let hash = task::structural_hash(&spec.tasks[0].steps);
        let mut persisted = HashMap::new();
        persisted.insert(
            task::task_id("task0", ""),
            PersistedTask {
                structural_hash: hash,
                steps: vec![Status::Success, Status::Failed, Status::Failed],
            },
        );
        let model = TaskModel::from_workflow(&spec, &persisted);
        assert_eq!(model.statuses(0), vec![Status::Success]);
    }

    #[test]
    fn empty_command_skips_without_spawning() {
        let model = fresh(&[&["", "echo 1"]]);
        let run = schedule_of(&model.startup_actions());
        match model.begin_step(0, 0, run.generation) {
            Dispatch::Skip => {}
            other => panic!("expected Skip, got {other:?}"),
        }
        assert_eq!(model.status_of(0, 0), Some(Status::Skipped));
    }

    #[test]
    fn failure_short_circuits_rest_of_task() {
        let model = fresh(&[&["a", "b", "c"]]);
        let run = schedule_of(&model.startup_actions());
        assert!(matches!(
            model.begin_step(0, 0, run.generation),
            Dispatch::Run { .. }
        ));
        let proceed = model.finish_step(0, 0, run.generation, StepOutcome::Exited(3));
        assert!(!proceed);
        assert_eq!(
            model.statuses(0),
            vec![Status::Failed, Status::Skipped, Status::Skipped]
        );
        assert!(model.all_done());
    }

    #[test]
    fn stale_generation_writes_nothing() {
        let model = fresh(&[&["a", "b"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);

        // A rerun bumps the generation while the worker is mid-step.
        let _ = model.rerun(0, 0);

        assert!(!model.finish_step(0, 0, run.generation, StepOutcome::Exited(0)));
        assert!(!model.append_output(0, 0, run.generation, OutputStream::Stdout, "late"));
        assert!(!model.append_debug(0, 0, run.generation, "late"));
        assert!(matches!(
            model.begin_step(0, 1, run.generation),
            Dispatch::Abort
        ));
        // The rerun reset the step; the stale writes left no trace.
        assert_eq!(model.status_of(0, 0), Some(Status::Pending));
        assert!(model.output_tail(0, 0).is_empty());
    }

    #[test]
    fn rerun_preserves_earlier_successes() {
        let model = fresh(&[&["a", "b", "c"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        model.finish_step(0, 0, run.generation, StepOutcome::Exited(0));
        model.begin_step(0, 1, run.generation);
        model.finish_step(0, 1, run.generation, StepOutcome::Exited(0));
        model.begin_step(0, 2, run.generation);
        model.finish_step(0, 2, run.generation, StepOutcome::Exited(1));

        let actions = model.rerun(0, 2);
        let rerun = schedule_of(&actions);
        assert_eq!(rerun.start_step, 2);
        assert_eq!(rerun.generation, run.generation + 1);
        assert_eq!(
            model.statuses(0),
            vec![Status::Success, Status::Success, Status::Pending]
        );
    }

    #[test]
    fn rerun_start_clamps_to_frontier() {
        let model = fresh(&[&["a", "b", "c"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        model.finish_step(0, 0, run.generation, StepOutcome::Exited(0));
        // Steps 1 and 2 are still PENDING; a rerun aimed at 2 starts at 1.
        let rerun = schedule_of(&model.rerun(0, 2));
        assert_eq!(rerun.start_step, 1);
    }

    #[test]
    fn rerun_of_running_step_kills_the_group() {
        let model = fresh(&[&["a", "b"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        model.attach_process(0, 0, run.generation, 4242, 4242);

        let actions = model.rerun(0, 0);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::KillGroup { pgid: 4242, .. })));
        assert_eq!(model.status_of(0, 0), Some(Status::Pending));
    }

    #[test]
    fn kill_commits_killed_and_leaves_rest_alone() {
        let model = fresh(&[&["a", "b"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        model.attach_process(0, 0, run.generation, 99, 99);

        let actions = model.kill(0);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::KillGroup { pgid: 99, .. })));
        assert_eq!(
            model.statuses(0),
            vec![Status::Killed, Status::Pending]
        );
        assert_eq!(model.generation(0), run.generation + 1);
        // The draining worker's wait() result must be discarded.
        assert!(!model.finish_step(0, 0, run.generation, StepOutcome::Signaled(15)));
        assert_eq!(model.status_of(0, 0), Some(Status::Killed));
    }

    #[test]
    fn kill_with_nothing_running_only_bumps_generation() {
        let model = fresh(&[&["a"]]);
        let before = model.generation(0);
        let actions = model.kill(0);
        assert!(!actions.iter().any(|a| matches!(a, Action::KillGroup { .. })));
        assert_eq!(model.generation(0), before + 1);
    }

    #[test]
    fn external_signal_maps_to_killed() {
        let model = fresh(&[&["a", "b"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        // Nobody bumped the generation: the kill came from outside.
        assert!(!model.finish_step(0, 0, run.generation, StepOutcome::Signaled(9)));
        assert_eq!(
            model.statuses(0),
            vec![Status::Killed, Status::Skipped]
        );
    }

    #[test]
    fn shutdown_kills_running_steps() {
        let model = fresh(&[&["a"], &["b"]]);
        let runs: Vec<TaskRun> = model
            .startup_actions()
            .iter()
            .filter_map(|a| match a {
                Action::Schedule(r) => Some(*r),
                _ => None,
            })
            .collect();
        model.begin_step(0, 0, runs[0].generation);
        model.attach_process(0, 0, runs[0].generation, 7, 7);

        let actions = model.shutdown();
        assert_eq!(
            actions
                .iter()
                .filter(|a| matches!(a, Action::KillGroup { .. }))
                .count(),
            1
        );
        assert_eq!(model.status_of(0, 0), Some(Status::Killed));
        // Task 1 never started; left as PENDING.
        assert_eq!(model.status_of(1, 0), Some(Status::Pending));
    }

    #[test]
    fn zero_step_task_is_immediately_done() {
        let model = fresh(&[&[]]);
        assert!(model.all_done());
        assert!(model.startup_actions().is_empty());
    }

    #[test]
    fn output_tail_is_tagged_and_bounded() {
        let model = fresh(&[&["a"]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        model.append_output(0, 0, run.generation, OutputStream::Stdout, "out");
        model.append_output(0, 0, run.generation, OutputStream::Stderr, "err");
        assert_eq!(model.output_tail(0, 0), vec!["out", "[stderr] err"]);
    }

    #[test]
    fn persisted_projection_round_trips_statuses() {
        let model = fresh(&[&["a", ""]]);
        let run = schedule_of(&model.startup_actions());
        model.begin_step(0, 0, run.generation);
        model.finish_step(0, 0, run.generation, StepOutcome::Exited(0));
        model.begin_step(0, 1, run.generation);

        let state = model.persisted();
        let record = state.tasks.values().next().unwrap();
        assert_eq!(record.steps, vec![Status::Success, Status::Skipped]);
    }
}
