// src/sched/mod.rs

//! Scheduler / worker-pool core.
//!
//! This module ties together:
//! - the bounded FIFO task queue ([`queue`])
//! - the fixed-size worker pool driving each task through its lifecycle
//!   ([`worker`])
//! - the submission loop and completion barrier ([`scheduler`])
//!
//! Tasks flow `submit → queue → worker`, each worker running the full
//! create/start/monitor/wait/cleanup sequence serially per task. Failures at
//! any lifecycle step abort that task only; a worker exits solely on queue
//! exhaustion.

pub mod queue;
pub mod scheduler;
pub mod task;
pub mod worker;

pub use queue::{TaskReceiver, TaskSender};
pub use scheduler::{Scheduler, Submission};
pub use task::Task;
