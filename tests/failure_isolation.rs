// tests/failure_isolation.rs

//! Per-task failures must stay inside the failing task: the worker survives
//! and every other task runs to completion.

use std::sync::Arc;
use std::time::Duration;

use minisched::config::SchedulerConfig;
use minisched::sched::{Scheduler, Submission};
use minisched_test_utils::{MockBackend, init_tracing, with_timeout};

const FULL_LIFECYCLE: [&str; 5] = ["create", "start", "stats", "wait", "remove"];

async fn run_scheduler(backend: Arc<MockBackend>, workers: usize, count: u32) {
    let config = SchedulerConfig {
        worker_count: workers,
        settle_delay: Duration::ZERO,
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(backend, config).expect("valid config");
    with_timeout(scheduler.run(Submission {
        count,
        image: "alpine".into(),
        command: "sleep 2".into(),
    }))
    .await
    .expect("run");
}

#[tokio::test]
async fn a_create_failure_abandons_only_that_task() {
    init_tracing();
    let backend = Arc::new(MockBackend::new().with_create_failure("job-2"));

    run_scheduler(Arc::clone(&backend), 1, 4).await;

    // job-2 never reached start, monitoring or wait.
    assert_eq!(backend.steps_for("job-2"), ["create"]);
    for id in ["job-1", "job-3", "job-4"] {
        assert_eq!(backend.steps_for(id), FULL_LIFECYCLE, "lifecycle of {id}");
    }
}

#[tokio::test]
async fn a_start_failure_removes_the_created_unit() {
    init_tracing();
    let backend = Arc::new(MockBackend::new().with_start_failure("job-1"));

    run_scheduler(Arc::clone(&backend), 1, 2).await;

    // The created-but-unstarted unit is cleaned up rather than leaked.
    assert_eq!(backend.steps_for("job-1"), ["create", "start", "remove"]);
    assert_eq!(backend.steps_for("job-2"), FULL_LIFECYCLE);
}

#[tokio::test]
async fn a_remove_failure_never_stops_the_worker() {
    init_tracing();
    let backend = Arc::new(MockBackend::new().with_remove_failure("job-1"));

    run_scheduler(Arc::clone(&backend), 1, 2).await;

    assert_eq!(backend.steps_for("job-1"), FULL_LIFECYCLE);
    assert_eq!(backend.steps_for("job-2"), FULL_LIFECYCLE);
}

#[tokio::test]
async fn a_panicking_worker_never_corrupts_the_completion_barrier() {
    init_tracing();
    let backend = Arc::new(
        MockBackend::new()
            .with_create_panic("job-2")
            .with_wait_delay(Duration::from_millis(10)),
    );

    // The worker holding job-2 dies mid-task; the barrier must still return
    // cleanly once the surviving workers drain the queue.
    run_scheduler(Arc::clone(&backend), 3, 5).await;

    assert_eq!(backend.steps_for("job-2"), ["create"]);
    for id in ["job-1", "job-3", "job-4", "job-5"] {
        assert_eq!(backend.steps_for(id), FULL_LIFECYCLE, "lifecycle of {id}");
    }
}

#[tokio::test]
async fn failures_on_one_worker_do_not_leak_into_others() {
    init_tracing();
    let backend = Arc::new(
        MockBackend::new()
            .with_create_failure("job-1")
            .with_wait_error("job-2")
            .with_wait_delay(Duration::from_millis(10)),
    );

    run_scheduler(Arc::clone(&backend), 3, 6).await;

    assert_eq!(backend.steps_for("job-1"), ["create"]);
    assert_eq!(backend.steps_for("job-2"), FULL_LIFECYCLE);
    for i in 3..=6 {
        let id = format!("job-{i}");
        assert_eq!(backend.steps_for(&id), FULL_LIFECYCLE, "lifecycle of {id}");
    }
}
