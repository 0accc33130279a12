// src/sched/worker.rs

//! Worker loop and per-task lifecycle.
//!
//! Each worker repeatedly pulls one task from the shared queue and drives it
//! through `create → start → monitor → wait → cleanup`, strictly in order,
//! before pulling the next. Failures are contained per step:
//!
//! - create / start / wait failures abort the current task (logged at error)
//!   and the worker moves on;
//! - a missed usage snapshot is logged at debug and never gates progress;
//! - removal failures are logged at warn and never escalate.
//!
//! A worker only ever exits because the queue closed and drained.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::{ExecutionBackend, UnitId};
use crate::monitor;

use super::queue::TaskReceiver;
use super::task::Task;

/// Per-worker slice of the scheduler configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub memory_limit_bytes: u64,
    pub settle_delay: Duration,
}

/// Drain the queue until it closes, running one task at a time.
pub async fn run_worker<B>(
    worker_id: usize,
    backend: Arc<B>,
    queue: TaskReceiver,
    settings: WorkerSettings,
) where
    B: ExecutionBackend + ?Sized,
{
    debug!(worker = worker_id, "worker started");

    while let Some(task) = queue.recv().await {
        info!(worker = worker_id, task = %task.id, "starting task");
        run_one_task(worker_id, backend.as_ref(), &task, settings).await;
    }

    debug!(worker = worker_id, "worker exiting (queue closed and drained)");
}

/// Drive a single task through its full lifecycle.
///
/// Never returns an error: every failure mode is logged and contained here
/// so the caller's loop cannot be broken by one bad task.
async fn run_one_task<B>(worker_id: usize, backend: &B, task: &Task, settings: WorkerSettings)
where
    B: ExecutionBackend + ?Sized,
{
    // 1. Create the unit with its resource ceiling attached.
    let unit = match backend
        .create(
            &task.image,
            &task.command,
            settings.memory_limit_bytes,
            &task.id,
        )
        .await
    {
        Ok(unit) => unit,
        Err(err) => {
            error!(worker = worker_id, task = %task.id, error = %err, "failed to create unit");
            return;
        }
    };

    // 2. Start it. The created unit must not leak if this fails.
    if let Err(err) = backend.start(&unit).await {
        error!(worker = worker_id, task = %task.id, error = %err, "failed to start unit");
        remove_unit(worker_id, backend, task, &unit).await;
        return;
    }

    // 3. One best-effort usage snapshot after a settling pause.
    tokio::time::sleep(settings.settle_delay).await;
    match monitor::snapshot(backend, &unit).await {
        Ok(snapshot) => {
            info!(
                worker = worker_id,
                task = %task.id,
                memory_mb = snapshot.memory_mb,
                "memory usage"
            );
        }
        Err(err) => {
            debug!(worker = worker_id, task = %task.id, error = %err, "usage snapshot unavailable");
        }
    }

    // 4. Block until the unit terminates.
    match backend.wait_for_exit(&unit).await {
        Ok(status) => {
            info!(
                worker = worker_id,
                task = %task.id,
                exit_code = status.code,
                "task finished"
            );
        }
        Err(err) => {
            error!(worker = worker_id, task = %task.id, error = %err, "wait error");
        }
    }

    // 5. Cleanup, regardless of how the wait ended.
    remove_unit(worker_id, backend, task, &unit).await;
}

async fn remove_unit<B>(worker_id: usize, backend: &B, task: &Task, unit: &UnitId)
where
    B: ExecutionBackend + ?Sized,
{
    if let Err(err) = backend.remove(unit).await {
        warn!(
            worker = worker_id,
            task = %task.id,
            unit = %unit,
            error = %err,
            "failed to remove unit; it may be leaked"
        );
    }
}
