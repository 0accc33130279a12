// src/config.rs

//! Scheduler configuration.
//!
//! The worker count and memory ceiling were fixed constants in earlier
//! iterations; they now live in an explicit [`SchedulerConfig`] validated at
//! construction time and passed into [`crate::sched::Scheduler`].

use std::time::Duration;

use crate::errors::{Result, SchedulerError};

/// Default number of concurrent workers (one node handling 3 tasks at once).
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Default hard memory ceiling per task: 128 MiB.
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 128 * 1024 * 1024;

/// Default task queue capacity; sized to absorb a full submission burst
/// without blocking the submitter.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default settling delay between starting a unit and taking its usage
/// snapshot, so the process has a moment to initialize.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed worker pool size; also the maximum number of execution units
    /// concurrently in flight.
    pub worker_count: usize,
    /// Hard memory ceiling attached to every unit at creation time.
    pub memory_limit_bytes: u64,
    /// Bounded capacity of the task queue. An undersized queue only makes
    /// the submission loop block, it never loses tasks.
    pub queue_capacity: usize,
    /// Pause between `start` and the usage snapshot.
    pub settle_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(SchedulerError::ConfigError(
                "worker_count must be greater than 0".into(),
            ));
        }
        if self.memory_limit_bytes == 0 {
            return Err(SchedulerError::ConfigError(
                "memory_limit_bytes must be greater than 0".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SchedulerError::ConfigError(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
