// src/backend/mod.rs

//! Isolated-execution backend abstraction.
//!
//! The scheduler talks to an [`ExecutionBackend`] instead of a concrete
//! container or process API. This keeps the worker-pool core independent of
//! how isolation is actually provided, and makes it easy to swap in a mock
//! backend in tests while keeping the production implementation in
//! [`process`].
//!
//! - [`ProcessBackend`] is the default implementation used by `minisched`.
//!   It runs each execution unit as a local shell child process with an
//!   rlimit-enforced memory ceiling.
//! - Tests can provide their own `ExecutionBackend` that, for example,
//!   records which units were created and scripts per-step failures.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub mod limits;
pub mod process;

pub use process::ProcessBackend;

/// Opaque handle for a running (or registered) execution unit.
///
/// Assigned by the backend at creation time; owned by exactly one worker for
/// the duration of one task's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal status of an execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i64,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Errors reported by an execution backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to connect to execution backend: {0}")]
    Connect(String),

    #[error("unit name already in use: {0}")]
    NameConflict(String),

    #[error("unknown execution unit: {0}")]
    UnknownUnit(UnitId),

    #[error("unit {0} is not in a startable state")]
    NotStartable(UnitId),

    #[error("failed to spawn unit process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("stats unavailable: {0}")]
    Stats(String),

    #[error("failed to decode stats payload: {0}")]
    StatsDecode(#[source] serde_json::Error),

    #[error("wait failed: {0}")]
    Wait(String),
}

/// Trait abstracting the isolated-execution backend consumed by the
/// scheduler core.
///
/// One unit maps to one task. All methods take `&self`; implementations are
/// shared across workers behind an `Arc` and synchronize internally. The
/// scheduler attaches no deadlines: a call that never returns parks the
/// worker that made it.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Register a new execution unit built from `image`, running `command`
    /// inside a shell, with a hard memory ceiling attached at creation time.
    ///
    /// `unit_name` is the caller-assigned task ID; a duplicate name is a
    /// backend-level conflict, not de-duplicated here.
    async fn create(
        &self,
        image: &str,
        command: &str,
        memory_limit_bytes: u64,
        unit_name: &str,
    ) -> Result<UnitId, BackendError>;

    /// Start a previously created unit.
    async fn start(&self, unit: &UnitId) -> Result<(), BackendError>;

    /// One non-streaming, point-in-time stats read for a running unit.
    ///
    /// The payload carries a `memory_stats.usage` byte count; decoding it is
    /// the monitor's job, not the backend's.
    async fn stats_snapshot(&self, unit: &UnitId) -> Result<serde_json::Value, BackendError>;

    /// Block until the unit reaches a terminal state.
    ///
    /// The two race outcomes of the original design (error channel vs status
    /// channel) collapse into this one tagged result: `Ok` carries the
    /// terminal status, `Err` the backend-reported wait error.
    async fn wait_for_exit(&self, unit: &UnitId) -> Result<ExitStatus, BackendError>;

    /// Remove the unit from the backend, killing it first if still running.
    async fn remove(&self, unit: &UnitId) -> Result<(), BackendError>;
}
