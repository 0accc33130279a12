// src/sched/task.rs

//! Task descriptors.

/// One caller-submitted unit of work.
///
/// Immutable once created; consumed exactly once by exactly one worker. The
/// `id` doubles as the backend unit name, so it must be unique within one
/// scheduler run (a duplicate is surfaced as a backend conflict, not
/// de-duplicated here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Caller-assigned ID, e.g. `job-4`.
    pub id: String,
    /// Execution-environment template the backend instantiates.
    pub image: String,
    /// Shell-invocable command executed inside the unit.
    pub command: String,
}
