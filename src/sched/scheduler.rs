// src/sched/scheduler.rs

//! Scheduler: submission loop, worker pool wiring and completion barrier.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backend::ExecutionBackend;
use crate::config::SchedulerConfig;
use crate::errors::Result;

use super::queue::{self, TaskSender};
use super::task::Task;
use super::worker::{self, WorkerSettings};

/// One batch of work: `count` tasks sharing an image and a command, with IDs
/// `job-1..job-count`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub count: u32,
    pub image: String,
    pub command: String,
}

/// Process-wide coordination object.
///
/// Owns the backend handle and the validated configuration; each call to
/// [`Scheduler::run`] builds a fresh queue and worker pool, so two runs never
/// share state (task IDs are only unique within one run).
pub struct Scheduler<B: ?Sized> {
    backend: Arc<B>,
    config: SchedulerConfig,
}

impl<B: ?Sized> fmt::Debug for Scheduler<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B> Scheduler<B>
where
    B: ExecutionBackend + ?Sized + 'static,
{
    /// Create a scheduler over `backend`, validating `config` up front.
    pub fn new(backend: Arc<B>, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Run one submission to completion.
    ///
    /// Spawns the worker pool and the submission loop, then acts as the
    /// completion barrier: returns only after the submitter and every worker
    /// have exited. Individual task failures never surface here, only
    /// through the log stream; a panicked worker is logged and does not
    /// poison the join of the rest.
    pub async fn run(&self, submission: Submission) -> Result<()> {
        let (tx, rx) = queue::bounded(self.config.queue_capacity);

        let settings = WorkerSettings {
            memory_limit_bytes: self.config.memory_limit_bytes,
            settle_delay: self.config.settle_delay,
        };

        let mut workers = Vec::with_capacity(self.config.worker_count);
        for worker_id in 1..=self.config.worker_count {
            let backend = Arc::clone(&self.backend);
            let rx = rx.clone();
            workers.push(tokio::spawn(worker::run_worker(
                worker_id, backend, rx, settings,
            )));
        }
        drop(rx);

        let submitter = tokio::spawn(submit_tasks(tx, submission));

        if let Err(err) = submitter.await {
            // The sender was dropped with the submitter, so the queue is
            // closed either way and the workers below still drain and exit.
            error!(error = %err, "submission loop panicked");
        }

        for handle in workers {
            if let Err(err) = handle.await {
                error!(error = %err, "worker panicked");
            }
        }

        info!("all tasks completed");
        Ok(())
    }
}

/// Submission loop: enqueue `job-1..job-count` in order, then close the
/// queue by dropping the sender.
async fn submit_tasks(tx: TaskSender, submission: Submission) {
    for i in 1..=submission.count {
        let task = Task {
            id: format!("job-{i}"),
            image: submission.image.clone(),
            command: submission.command.clone(),
        };
        let id = task.id.clone();

        if tx.send(task).await.is_err() {
            // Only possible if every worker died; nothing left to feed.
            warn!(task = %id, "task queue closed before submission finished");
            return;
        }
        debug!(task = %id, "submitted");
    }
    // `tx` dropped here: single close, after the last submission.
}
