//! Two tasks, three echo steps each, two workers: everything succeeds, log
//! files appear, and the flushed state file carries the matching hashes.

use std::fs;
use std::time::Duration;

use tempfile::TempDir;

use workpanel::engine::{stdout_log_path, Engine};
use workpanel::model::task::Status;
use workpanel::model::TaskModel;
use workpanel::state::StateStore;
use workpanel_test_utils::builders::{fresh_model, WorkflowBuilder};
use workpanel_test_utils::{init_tracing, wait_until};

#[test]
fn all_steps_succeed_and_state_flushes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let logs_root = dir.path().join(".logs");

    let spec = WorkflowBuilder::new()
        .path(dir.path().join("tasks.csv"))
        .with_task("A", &["echo 1", "echo 2", "echo 3"])
        .with_task("B", &["echo 1", "echo 2", "echo 3"])
        .build();

    let model = fresh_model(&spec);
    let engine = Engine::start(model.clone(), 2, logs_root.clone()).unwrap();
    engine.apply(model.startup_actions());

    assert!(
        wait_until(Duration::from_secs(10), || model.all_done()),
        "workflow did not drain in time"
    );

    for task in 0..2 {
        assert_eq!(
            model.statuses(task),
            vec![Status::Success, Status::Success, Status::Success]
        );
    }

    // Log files exist for each step, with the echoed output inside.
    for task in 0..2 {
        let task_id = model.task_id(task).unwrap();
        for step in 0..3 {
            let path = stdout_log_path(&logs_root, &task_id, step);
            let contents = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("missing log {}: {e}", path.display()));
            assert_eq!(contents, format!("{}\n", step + 1));
        }
        // The tails carry the same lines.
        assert_eq!(model.output_tail(task, 0), vec!["1"]);
    }

    // Flush through the store and load it back under the same hashes.
    let store = StateStore::for_workflow(&spec.path);
    store.save(&model.persisted()).unwrap();

    let hashes = TaskModel::structural_hashes(&spec);
    let resumed = store.load(&hashes);
    assert_eq!(resumed.len(), 2);
    for record in resumed.values() {
        assert_eq!(record.steps, vec![Status::Success; 3]);
    }
}
