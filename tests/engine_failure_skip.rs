//! A failing step short-circuits the rest of its task.

use std::time::Duration;

use tempfile::TempDir;

use workpanel::engine::Engine;
use workpanel::model::task::Status;
use workpanel_test_utils::builders::{fresh_model, WorkflowBuilder};
use workpanel_test_utils::{init_tracing, wait_until};

#[test]
fn failure_skips_later_steps() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let spec = WorkflowBuilder::new()
        .with_task("X", &["true", "false", "true"])
        .build();

    let model = fresh_model(&spec);
    let engine = Engine::start(model.clone(), 1, dir.path().join(".logs")).unwrap();
    engine.apply(model.startup_actions());

    assert!(wait_until(Duration::from_secs(10), || model.all_done()));
    assert_eq!(
        model.statuses(0),
        vec![Status::Success, Status::Failed, Status::Skipped]
    );
}

#[test]
fn empty_command_is_skipped_without_spawning() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let spec = WorkflowBuilder::new()
        .headers(&["prepare", "run"])
        .with_task("Y", &["", "echo done"])
        .build();

    let model = fresh_model(&spec);
    let engine = Engine::start(model.clone(), 1, dir.path().join(".logs")).unwrap();
    engine.apply(model.startup_actions());

    assert!(wait_until(Duration::from_secs(10), || model.all_done()));
    assert_eq!(model.statuses(0), vec![Status::Skipped, Status::Success]);
    // No log directory entry for the skipped step.
    let task_id = model.task_id(0).unwrap();
    assert!(!workpanel::engine::stdout_log_path(&dir.path().join(".logs"), &task_id, 0).exists());
}

#[test]
fn command_not_found_fails_the_step() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let spec = WorkflowBuilder::new()
        .with_task("Z", &["definitely-not-a-command-9f3a", "echo later"])
        .build();

    let model = fresh_model(&spec);
    let engine = Engine::start(model.clone(), 1, dir.path().join(".logs")).unwrap();
    engine.apply(model.startup_actions());

    assert!(wait_until(Duration::from_secs(10), || model.all_done()));
    // `sh -c` exits 127 for an unknown command: a FAILED step, not a crash.
    assert_eq!(model.statuses(0), vec![Status::Failed, Status::Skipped]);
}
