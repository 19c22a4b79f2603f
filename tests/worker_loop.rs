//! Worker loop, dispatch boundary and crash recovery against in-memory stores

mod common;

use chrono::Utc;
use common::{FailingStore, FlakyStore, Harness, RecordingStore};
use grant_worker::queue::REQUEUE_MESSAGE;
use grant_worker::worker::{recover_stale_tasks, recover_stale_tasks_before};
use grant_worker::{
    Dispatcher, InMemoryTaskStore, NewTask, Outcome, Task, TaskRunner, TaskStatus, TaskStore,
    WorkerConfig, WorkerId,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

type Store = Arc<RecordingStore<InMemoryTaskStore>>;

fn recording_store() -> Store {
    Arc::new(RecordingStore::new(InMemoryTaskStore::new()))
}

fn runner(store: &Store, harness: &Harness, worker_id: &str) -> TaskRunner {
    let store: Arc<dyn TaskStore> = store.clone();
    let dispatcher = Dispatcher::new(Arc::clone(&store), harness.context.clone());
    let config = WorkerConfig::builder()
        .poll_interval(Duration::from_millis(20))
        .build();
    TaskRunner::new(store, dispatcher, config, WorkerId::from(worker_id))
}

/// A processing task claimed by `worker` that started `age` ago
fn orphaned(task_type: &str, worker: &str, age: chrono::Duration) -> Task {
    let mut task = Task::from_new(NewTask::new(task_type, json!({"language": "en"})));
    task.status = TaskStatus::Processing;
    task.worker_id = Some(worker.to_string());
    task.started_at = Some(Utc::now() - age);
    task.progress = 40;
    task
}

#[tokio::test]
async fn test_concurrent_runners_claim_each_task_once() {
    let store = Arc::new(InMemoryTaskStore::new());
    for _ in 0..20 {
        store.create_task(NewTask::new("requirement_extraction", json!({})));
    }

    let mut handles = Vec::new();
    for n in 0..4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let worker = WorkerId::new(format!("w{}", n));
            let mut claimed = Vec::new();
            while let Some(task) = store.claim_next_task(&worker).await.unwrap() {
                claimed.push(task.id);
                tokio::task::yield_now().await;
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "task {} claimed twice", id);
        }
    }
    assert_eq!(seen.len(), 20);
    assert_eq!(store.count_pending(), 0);
}

#[tokio::test]
async fn test_claim_tags_task_with_worker() {
    let store = recording_store();
    let harness = Harness::new();
    let task = store
        .inner
        .create_task(NewTask::new("requirement_extraction", json!({})));

    assert!(runner(&store, &harness, "alpha").process_one_task().await);

    let task = store.inner.get_task(task.id).unwrap();
    assert_eq!(task.worker_id.as_deref(), Some("alpha"));
    assert!(task.started_at.is_some());
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_empty_queue_is_not_work() {
    let store = recording_store();
    let harness = Harness::new();
    assert!(!runner(&store, &harness, "alpha").process_one_task().await);
}

#[tokio::test]
async fn test_unknown_task_type_fails_without_running_a_handler() {
    let store = recording_store();
    let harness = Harness::new();
    let task = store.inner.create_task(NewTask::new("bogus", json!({})));

    assert!(runner(&store, &harness, "alpha").process_one_task().await);

    let task = store.inner.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.unwrap().contains("bogus"));
    assert!(task.result_data.is_none());
    assert!(store.progress_of(task.id).is_empty());
    assert!(harness.repository.read(|s| s.project_updates.is_empty()));
}

#[tokio::test]
async fn test_each_task_gets_exactly_one_terminal_write() {
    let store = recording_store();
    let harness = Harness::new();
    let project_id = harness.repository.add_project("Solar farm", None);

    let ok = store
        .inner
        .create_task(NewTask::new("infobit_generation", json!({})).with_project(project_id));
    let bad = store.inner.create_task(NewTask::new("evaluation", json!({})));

    let runner = runner(&store, &harness, "alpha");
    while runner.process_one_task().await {}

    assert_eq!(store.terminal_writes(ok.id), vec!["complete"]);
    assert_eq!(store.terminal_writes(bad.id), vec!["fail"]);

    let ok = store.inner.get_task(ok.id).unwrap();
    assert_eq!(ok.status, TaskStatus::Completed);
    assert!(ok.error_message.is_none());
    assert_eq!(ok.result_data, Some(json!({"infobits_count": 13})));

    let bad = store.inner.get_task(bad.id).unwrap();
    assert_eq!(bad.status, TaskStatus::Failed);
    assert_eq!(bad.error_message.as_deref(), Some("Task has no project_id"));
    assert!(bad.result_data.is_none());
}

#[tokio::test]
async fn test_progress_is_reported_in_order() {
    let store = recording_store();
    let harness = Harness::new();
    let project_id = harness.repository.add_project("Solar farm", None);
    let task = store
        .inner
        .create_task(NewTask::new("infobit_generation", json!({})).with_project(project_id));

    runner(&store, &harness, "alpha").process_one_task().await;

    assert_eq!(store.progress_of(task.id), vec![10, 60, 80, 100]);
    assert_eq!(store.inner.get_task(task.id).unwrap().progress, 100);
}

#[tokio::test]
async fn test_progress_write_failures_do_not_fail_the_task() {
    let harness = Harness::new();
    let project_id = harness.repository.add_project("Solar farm", None);
    let mut flaky = FlakyStore::new(InMemoryTaskStore::new());
    flaky.progress_down = true;
    let task = flaky
        .inner
        .create_task(NewTask::new("requirement_extraction", json!({})).with_project(project_id));
    let store = Arc::new(flaky);

    let dyn_store: Arc<dyn TaskStore> = store.clone();
    let dispatcher = Dispatcher::new(Arc::clone(&dyn_store), harness.context.clone());
    let config = WorkerConfig::builder()
        .poll_interval(Duration::from_millis(20))
        .build();
    let worker = TaskRunner::new(dyn_store, dispatcher, config, WorkerId::from("alpha"));
    assert!(worker.process_one_task().await);

    let task = store.inner.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.progress_message.is_none());
    assert!(task.error_message.is_none());
    assert_eq!(
        task.result_data,
        Some(json!({"requirements_processed": 0, "items_extracted": 0}))
    );
}

#[tokio::test]
async fn test_repository_failure_fails_the_task() {
    let store = recording_store();
    let harness = Harness::new();
    let project_id = harness.repository.add_project("Solar farm", None);
    harness
        .repository
        .with(|s| s.project_error = Some("database unavailable".to_string()));

    let task = store.inner.create_task(
        NewTask::new("generation", json!({"output_type": "budget_xlsx"})).with_project(project_id),
    );
    runner(&store, &harness, "alpha").process_one_task().await;

    let task = store.inner.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("database unavailable"));
    assert!(task.result_data.is_none());
    assert!(harness.storage.uploads().is_empty());
}

#[tokio::test]
async fn test_handler_panic_fails_the_task_and_worker_continues() {
    let store = recording_store();
    let harness = Harness::new();
    let project_id = harness.repository.add_project("Solar farm", None);
    harness.repository.with(|s| s.panic_on_project = true);

    let panicking = store.inner.create_task(
        NewTask::new("generation", json!({"output_type": "budget_xlsx"})).with_project(project_id),
    );
    let next = store
        .inner
        .create_task(NewTask::new("requirement_extraction", json!({})));

    let runner = runner(&store, &harness, "alpha");
    assert!(runner.process_one_task().await);
    assert!(runner.process_one_task().await);

    let panicking = store.inner.get_task(panicking.id).unwrap();
    assert_eq!(panicking.status, TaskStatus::Failed);
    assert_eq!(
        panicking.error_message.as_deref(),
        Some("Handler panicked: project lookup exploded")
    );
    assert_eq!(
        store.inner.get_task(next.id).unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn test_task_timeout_fails_the_task() {
    let store = recording_store();
    let harness = Harness::new();
    let project_id = harness.repository.add_project("Solar farm", None);
    harness
        .repository
        .with(|s| s.project_delay = Some(Duration::from_secs(30)));

    let task = store
        .inner
        .create_task(NewTask::new("evaluation", json!({})).with_project(project_id));
    let claimed = store
        .claim_next_task(&WorkerId::from("alpha"))
        .await
        .unwrap()
        .unwrap();

    let store_dyn: Arc<dyn TaskStore> = store.clone();
    let dispatcher = Dispatcher::new(store_dyn, harness.context.clone())
        .with_task_timeout(Some(Duration::from_secs(1)));
    let outcome = dispatcher.dispatch(&claimed).await.unwrap();

    assert_eq!(outcome, Outcome::Failure("Task timed out after 1s".to_string()));
    let task = store.inner.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("Task timed out after 1s"));
}

#[tokio::test]
async fn test_claim_error_counts_as_no_task() {
    let harness = Harness::new();
    let store: Arc<dyn TaskStore> = Arc::new(FailingStore);
    let dispatcher = Dispatcher::new(Arc::clone(&store), harness.context.clone());
    let runner = TaskRunner::new(
        store,
        dispatcher,
        WorkerConfig::default(),
        WorkerId::from("alpha"),
    );

    assert!(!runner.process_one_task().await);
    assert_eq!(runner.recover().await, 0);
}

#[tokio::test]
async fn test_recovery_requeues_only_stale_processing_tasks() {
    let store = InMemoryTaskStore::new();
    let fresh = orphaned("evaluation", "w1", chrono::Duration::minutes(1));
    let stale = orphaned("evaluation", "w2", chrono::Duration::minutes(3));
    let mut finished = orphaned("evaluation", "w3", chrono::Duration::minutes(10));
    finished.status = TaskStatus::Completed;
    for task in [&fresh, &stale, &finished] {
        store.insert(task.clone());
    }

    let requeued = recover_stale_tasks(&store, Duration::from_secs(120)).await;
    assert_eq!(requeued, 1);

    let fresh = store.get_task(fresh.id).unwrap();
    assert_eq!(fresh.status, TaskStatus::Processing);
    assert_eq!(fresh.worker_id.as_deref(), Some("w1"));

    let stale = store.get_task(stale.id).unwrap();
    assert_eq!(stale.status, TaskStatus::Pending);
    assert_eq!(stale.progress, 0);
    assert_eq!(stale.worker_id, None);
    assert_eq!(stale.progress_message.as_deref(), Some(REQUEUE_MESSAGE));

    assert_eq!(
        store.get_task(finished.id).unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn test_recovery_cutoff_is_strict() {
    let store = InMemoryTaskStore::new();
    let task = orphaned("evaluation", "w1", chrono::Duration::zero());
    let started = task.started_at.unwrap();
    store.insert(task.clone());

    assert_eq!(recover_stale_tasks_before(&store, started).await, 0);
    assert_eq!(
        recover_stale_tasks_before(&store, started + chrono::Duration::milliseconds(1)).await,
        1
    );
}

#[tokio::test]
async fn test_recovery_continues_past_a_failed_requeue() {
    let tasks: Vec<Task> = ["w1", "w2", "w3"]
        .iter()
        .map(|worker| orphaned("evaluation", worker, chrono::Duration::minutes(5)))
        .collect();
    let mut store = FlakyStore::new(InMemoryTaskStore::new());
    store.requeue_fails_for = Some(tasks[1].id);
    for task in &tasks {
        store.inner.insert(task.clone());
    }

    let requeued = recover_stale_tasks(&store, Duration::from_secs(120)).await;
    assert_eq!(requeued, 2);

    let statuses: Vec<TaskStatus> = tasks
        .iter()
        .map(|task| store.inner.get_task(task.id).unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Pending, TaskStatus::Processing, TaskStatus::Pending]
    );
}

#[tokio::test]
async fn test_restarted_worker_finishes_orphaned_task() {
    let store = recording_store();
    let harness = Harness::new();
    let task = orphaned(
        "requirement_extraction",
        "crashed",
        chrono::Duration::seconds(121),
    );
    store.inner.insert(task.clone());

    let replacement = runner(&store, &harness, "replacement");
    assert!(replacement.run_once().await);

    let task = store.inner.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.worker_id.as_deref(), Some("replacement"));
    assert_eq!(
        task.result_data,
        Some(json!({"requirements_processed": 0, "items_extracted": 0}))
    );
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let store = recording_store();
    let harness = Harness::new();
    let runner = runner(&store, &harness, "alpha");
    let task = store
        .inner
        .create_task(NewTask::new("requirement_extraction", json!({})));

    let shutdown = runner.shutdown_handle();
    let handle = tokio::spawn(async move { runner.run().await });

    for _ in 0..100 {
        if store.inner.get_task(task.id).unwrap().is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.store(true, std::sync::atomic::Ordering::Relaxed);

    let stopped = tokio::time::timeout(Duration::from_secs(10), handle).await;
    assert!(matches!(stopped, Ok(Ok(Ok(())))));
    assert_eq!(
        store.inner.get_task(task.id).unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn test_failed_terminal_write_is_reported() {
    let harness = Harness::new();
    let store: Arc<dyn TaskStore> = Arc::new(FailingStore);
    let dispatcher = Dispatcher::new(store, harness.context.clone());
    let task = Task::from_new(NewTask::new("bogus", json!({})));

    assert!(dispatcher.dispatch(&task).await.is_err());
    assert_eq!(
        dispatcher.execute(&task).await,
        Outcome::Failure("Unknown task type: bogus".to_string())
    );
}
