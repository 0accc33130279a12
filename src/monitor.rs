// src/monitor.rs

//! Point-in-time resource usage readings for running execution units.
//!
//! The monitor asks the backend for one non-streaming stats payload, decodes
//! the memory-usage field and converts it to megabytes. Callers treat every
//! failure here as non-fatal: a missed snapshot only means a missed report,
//! never a lifecycle decision.

use serde::Deserialize;

use crate::backend::{BackendError, ExecutionBackend, UnitId};

/// Memory usage of one unit at one observation instant.
///
/// Produced best-effort once per task and only reported; the ceiling itself
/// is enforced by the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSnapshot {
    pub memory_mb: f64,
}

#[derive(Debug, Deserialize)]
struct StatsPayload {
    memory_stats: MemoryStats,
}

#[derive(Debug, Deserialize)]
struct MemoryStats {
    usage: u64,
}

/// Take one usage snapshot for `unit`.
///
/// Propagates backend and decode errors; the worker simply omits the report
/// on failure.
pub async fn snapshot<B>(backend: &B, unit: &UnitId) -> Result<UsageSnapshot, BackendError>
where
    B: ExecutionBackend + ?Sized,
{
    let raw = backend.stats_snapshot(unit).await?;
    let payload: StatsPayload =
        serde_json::from_value(raw).map_err(BackendError::StatsDecode)?;

    Ok(UsageSnapshot {
        memory_mb: payload.memory_stats.usage as f64 / 1024.0 / 1024.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_bytes_convert_to_fractional_megabytes() {
        let raw = serde_json::json!({ "memory_stats": { "usage": 3 * 1024 * 1024 + 512 * 1024 } });
        let payload: StatsPayload = serde_json::from_value(raw).unwrap();

        let mb = payload.memory_stats.usage as f64 / 1024.0 / 1024.0;
        assert!((mb - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn payloads_without_memory_stats_fail_to_decode() {
        let raw = serde_json::json!({ "cpu_stats": {} });
        assert!(serde_json::from_value::<StatsPayload>(raw).is_err());
    }
}
