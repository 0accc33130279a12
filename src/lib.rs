// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod monitor;
pub mod sched;

use std::sync::Arc;

use tracing::info;

use crate::backend::ProcessBackend;
use crate::cli::CliArgs;
use crate::config::SchedulerConfig;
use crate::errors::{Result, SchedulerError};
use crate::sched::{Scheduler, Submission};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - configuration from CLI flags
/// - the backend connection (the only fatal failure point)
/// - scheduler / queue / worker pool
/// - the completion barrier
pub async fn run(args: CliArgs) -> Result<()> {
    let config = config_from_args(&args)?;

    // Backend connection failure aborts before any scheduling begins.
    let backend = Arc::new(ProcessBackend::connect()?);

    info!(
        workers = config.worker_count,
        tasks = args.count,
        image = %args.image,
        "mini scheduler initialized"
    );

    let scheduler = Scheduler::new(backend, config)?;
    scheduler
        .run(Submission {
            count: args.count,
            image: args.image.clone(),
            command: args.cmd.clone(),
        })
        .await
}

fn config_from_args(args: &CliArgs) -> Result<SchedulerConfig> {
    let memory_limit_bytes = args.memory_limit_mb.checked_mul(1024 * 1024).ok_or_else(|| {
        SchedulerError::ConfigError(format!(
            "memory limit of {} MiB is out of range",
            args.memory_limit_mb
        ))
    })?;

    Ok(SchedulerConfig {
        worker_count: args.workers,
        memory_limit_bytes,
        ..SchedulerConfig::default()
    })
}
