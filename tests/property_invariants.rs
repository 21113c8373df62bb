//! Property suite over the model's state machine, without real processes.
//!
//! A simulated worker pool interleaves step begin/finish callbacks with
//! arbitrary rerun/kill sequences and asserts the structural invariants
//! after every operation:
//! - at most one step per task is RUNNING;
//! - a RUNNING or terminal (non-SKIPPED) step has only terminal steps
//!   before it;
//! - generations never decrease;
//! - after a full drain nothing is left RUNNING.

use proptest::prelude::*;

use workpanel::model::task::Status;
use workpanel::model::{Action, Dispatch, StepOutcome, TaskModel, TaskRun};
use workpanel_test_utils::builders::{fresh_model, WorkflowBuilder};

const TASKS: usize = 3;
const STEPS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Rerun { task: usize, step: usize },
    Kill { task: usize },
    Begin { slot: usize },
    Finish { slot: usize, code: i32 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..TASKS, 0..STEPS).prop_map(|(task, step)| Op::Rerun { task, step }),
        (0..TASKS).prop_map(|task| Op::Kill { task }),
        (0..8usize).prop_map(|slot| Op::Begin { slot }),
        (0..8usize, 0..2i32).prop_map(|(slot, code)| Op::Finish { slot, code }),
    ]
}

/// One simulated in-flight task-run on a pretend worker.
struct SimRun {
    run: TaskRun,
    next: usize,
    in_step: bool,
}

fn enqueue(actions: Vec<Action>, runs: &mut Vec<SimRun>) {
    for action in actions {
        if let Action::Schedule(run) = action {
            runs.push(SimRun {
                run,
                next: run.start_step,
                in_step: false,
            });
        }
    }
}

/// Advance one run by one callback, the way a worker thread would.
fn sim_begin(model: &TaskModel, runs: &mut Vec<SimRun>, slot: usize) {
    if runs.is_empty() {
        return;
    }
    let idx = slot % runs.len();
    if runs[idx].in_step {
        return;
    }
    if runs[idx].next >= STEPS {
        runs.remove(idx);
        return;
    }
    let (task, step, generation) = (runs[idx].run.task, runs[idx].next, runs[idx].run.generation);
    match model.begin_step(task, step, generation) {
        Dispatch::Run { .. } => runs[idx].in_step = true,
        Dispatch::Skip => runs[idx].next += 1,
        Dispatch::Abort => {
            runs.remove(idx);
        }
    }
}

fn sim_finish(model: &TaskModel, runs: &mut Vec<SimRun>, slot: usize, code: i32) {
    if runs.is_empty() {
        return;
    }
    let idx = slot % runs.len();
    if !runs[idx].in_step {
        return;
    }
    let (task, step, generation) = (runs[idx].run.task, runs[idx].next, runs[idx].run.generation);
    if model.finish_step(task, step, generation, StepOutcome::Exited(code)) {
        runs[idx].in_step = false;
        runs[idx].next += 1;
    } else {
        // Failure, short-circuit, or a stale generation: the run is over.
        runs.remove(idx);
    }
}

fn check_invariants(
    model: &TaskModel,
    generations: &mut [u64],
) -> proptest::test_runner::TestCaseResult {
    for task in 0..TASKS {
        let statuses = model.statuses(task);

        let running = statuses.iter().filter(|s| **s == Status::Running).count();
        prop_assert!(running <= 1, "task {task}: {running} RUNNING steps: {statuses:?}");

        for (i, status) in statuses.iter().enumerate() {
            let pinned = matches!(
                status,
                Status::Running | Status::Success | Status::Failed | Status::Killed
            );
            if pinned {
                for j in 0..i {
                    prop_assert!(
                        statuses[j].is_terminal(),
                        "task {task}: step {i} is {status:?} but step {j} is {:?}",
                        statuses[j]
                    );
                }
            }
        }

        let generation = model.generation(task);
        prop_assert!(
            generation >= generations[task],
            "task {task}: generation went backwards"
        );
        generations[task] = generation;
    }
    Ok(())
}

proptest! {
    #[test]
    fn model_invariants_hold_under_rerun_kill_storms(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let spec = WorkflowBuilder::new()
            .with_task("t0", &["a", "b", "c"])
            .with_task("t1", &["a", "b", "c"])
            .with_task("t2", &["a", "b", "c"])
            .build();
        let model = fresh_model(&spec);
        let mut generations = vec![0u64; TASKS];
        let mut runs: Vec<SimRun> = Vec::new();

        enqueue(model.startup_actions(), &mut runs);
        check_invariants(&model, &mut generations)?;

        for op in ops {
            match op {
                Op::Rerun { task, step } => enqueue(model.rerun(task, step), &mut runs),
                Op::Kill { task } => {
                    let _ = model.kill(task);
                }
                Op::Begin { slot } => sim_begin(&model, &mut runs, slot),
                Op::Finish { slot, code } => sim_finish(&model, &mut runs, slot, code),
            }
            check_invariants(&model, &mut generations)?;
        }

        // Drain every remaining run to completion.
        let mut max_iters = 10_000;
        while !runs.is_empty() && max_iters > 0 {
            max_iters -= 1;
            if runs[0].in_step {
                sim_finish(&model, &mut runs, 0, 0);
            } else {
                sim_begin(&model, &mut runs, 0);
            }
            check_invariants(&model, &mut generations)?;
        }
        prop_assert!(runs.is_empty(), "drain did not converge");

        // No step may be left RUNNING after the drain.
        for task in 0..TASKS {
            let statuses = model.statuses(task);
            prop_assert!(
                !statuses.contains(&Status::Running),
                "task {task} left RUNNING after drain: {statuses:?}"
            );
        }
    }
}
