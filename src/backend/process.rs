// src/backend/process.rs

//! Local-process execution backend.
//!
//! Runs each execution unit as a shell child process (`sh -c` on Unix,
//! `cmd /C` on Windows) with the memory ceiling applied through
//! [`limits::attach_memory_limit`]. Point-in-time memory stats come from
//! `/proc/<pid>/status` (Linux only).
//!
//! The `image` field of a task is accepted for interface compatibility and
//! logged, but has no effect here: the host environment is the only
//! execution-environment template this backend knows.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;
use uuid::Uuid;

use super::limits;
use super::{BackendError, ExecutionBackend, ExitStatus, UnitId};

/// Everything needed to spawn a unit process, captured at creation time.
#[derive(Debug, Clone)]
struct UnitSpec {
    command: String,
    memory_limit_bytes: u64,
}

enum UnitState {
    Created(UnitSpec),
    Running(Child),
    /// A worker is blocked in `wait_for_exit`; the child has been taken out
    /// of the registry but the name stays reserved.
    Waiting,
    Exited(ExitStatus),
}

struct Unit {
    name: String,
    state: UnitState,
}

#[derive(Default)]
struct Registry {
    units: HashMap<UnitId, Unit>,
    names: HashSet<String>,
}

/// Production [`ExecutionBackend`] backed by local shell processes.
pub struct ProcessBackend {
    registry: Mutex<Registry>,
}

impl ProcessBackend {
    /// Connect to the backend: verify the platform shell is reachable.
    ///
    /// This is the only fatal failure point at startup; everything after it
    /// is per-task.
    pub fn connect() -> Result<Self, BackendError> {
        let shell = shell_program();
        if find_in_path(shell).is_none() {
            return Err(BackendError::Connect(format!(
                "shell '{shell}' not found in PATH"
            )));
        }

        Ok(Self {
            registry: Mutex::new(Registry::default()),
        })
    }

    fn running_pid(&self, unit: &UnitId) -> Result<u32, BackendError> {
        let registry = self.registry.lock().unwrap();
        let entry = registry
            .units
            .get(unit)
            .ok_or_else(|| BackendError::UnknownUnit(unit.clone()))?;

        match &entry.state {
            UnitState::Running(child) => child
                .id()
                .ok_or_else(|| BackendError::Stats("unit process already reaped".into())),
            _ => Err(BackendError::Stats("unit is not running".into())),
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    async fn create(
        &self,
        image: &str,
        command: &str,
        memory_limit_bytes: u64,
        unit_name: &str,
    ) -> Result<UnitId, BackendError> {
        let mut registry = self.registry.lock().unwrap();
        if !registry.names.insert(unit_name.to_string()) {
            return Err(BackendError::NameConflict(unit_name.to_string()));
        }

        let id = UnitId(Uuid::new_v4().to_string());
        debug!(
            unit = %id,
            name = unit_name,
            image,
            "registered execution unit (image has no effect for the process backend)"
        );

        registry.units.insert(
            id.clone(),
            Unit {
                name: unit_name.to_string(),
                state: UnitState::Created(UnitSpec {
                    command: command.to_string(),
                    memory_limit_bytes,
                }),
            },
        );

        Ok(id)
    }

    async fn start(&self, unit: &UnitId) -> Result<(), BackendError> {
        let mut registry = self.registry.lock().unwrap();
        let entry = registry
            .units
            .get_mut(unit)
            .ok_or_else(|| BackendError::UnknownUnit(unit.clone()))?;

        let spec = match &entry.state {
            UnitState::Created(spec) => spec.clone(),
            _ => return Err(BackendError::NotStartable(unit.clone())),
        };

        let mut cmd = shell_command(&spec.command);
        cmd.stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        limits::attach_memory_limit(&mut cmd, spec.memory_limit_bytes);

        let child = cmd.spawn().map_err(BackendError::Spawn)?;
        debug!(unit = %unit, name = %entry.name, pid = child.id(), "unit process started");
        entry.state = UnitState::Running(child);

        Ok(())
    }

    async fn stats_snapshot(&self, unit: &UnitId) -> Result<serde_json::Value, BackendError> {
        let pid = self.running_pid(unit)?;
        let usage_bytes = read_rss_bytes(pid).await?;

        Ok(serde_json::json!({
            "memory_stats": { "usage": usage_bytes }
        }))
    }

    async fn wait_for_exit(&self, unit: &UnitId) -> Result<ExitStatus, BackendError> {
        let child = {
            let mut registry = self.registry.lock().unwrap();
            let entry = registry
                .units
                .get_mut(unit)
                .ok_or_else(|| BackendError::UnknownUnit(unit.clone()))?;

            match std::mem::replace(&mut entry.state, UnitState::Waiting) {
                UnitState::Running(child) => child,
                UnitState::Exited(status) => {
                    entry.state = UnitState::Exited(status);
                    return Ok(status);
                }
                state @ UnitState::Created(_) => {
                    entry.state = state;
                    return Err(BackendError::Wait("unit was never started".into()));
                }
                UnitState::Waiting => {
                    return Err(BackendError::Wait("wait already in progress".into()));
                }
            }
        };

        // Lock released; block on the child without holding the registry.
        let mut child = child;
        let status = child
            .wait()
            .await
            .map_err(|e| BackendError::Wait(e.to_string()))?;
        let status = ExitStatus {
            code: i64::from(status.code().unwrap_or(-1)),
        };

        let mut registry = self.registry.lock().unwrap();
        if let Some(entry) = registry.units.get_mut(unit) {
            entry.state = UnitState::Exited(status);
        }

        Ok(status)
    }

    async fn remove(&self, unit: &UnitId) -> Result<(), BackendError> {
        let mut registry = self.registry.lock().unwrap();
        let entry = registry
            .units
            .remove(unit)
            .ok_or_else(|| BackendError::UnknownUnit(unit.clone()))?;
        registry.names.remove(&entry.name);
        drop(registry);

        if let UnitState::Running(mut child) = entry.state {
            // Best effort; kill_on_drop covers a failed signal.
            let _ = child.start_kill();
        }

        debug!(unit = %unit, name = %entry.name, "execution unit removed");
        Ok(())
    }
}

fn shell_program() -> &'static str {
    if cfg!(windows) { "cmd.exe" } else { "sh" }
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(target_os = "linux")]
async fn read_rss_bytes(pid: u32) -> Result<u64, BackendError> {
    let status = tokio::fs::read_to_string(format!("/proc/{pid}/status"))
        .await
        .map_err(|e| BackendError::Stats(format!("reading /proc/{pid}/status: {e}")))?;

    for line in status.lines() {
        if let Some(value) = line.strip_prefix("VmRSS:") {
            let kib: u64 = value
                .split_whitespace()
                .next()
                .and_then(|token| token.parse().ok())
                .ok_or_else(|| BackendError::Stats(format!("malformed VmRSS line: {line}")))?;
            return Ok(kib * 1024);
        }
    }

    Err(BackendError::Stats(format!(
        "no VmRSS entry in /proc/{pid}/status"
    )))
}

#[cfg(not(target_os = "linux"))]
async fn read_rss_bytes(_pid: u32) -> Result<u64, BackendError> {
    Err(BackendError::Stats(
        "point-in-time memory stats are only supported on Linux".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEM_LIMIT: u64 = 512 * 1024 * 1024;

    #[cfg(unix)]
    #[tokio::test]
    async fn full_lifecycle_of_a_trivial_unit() {
        let backend = ProcessBackend::connect().expect("connect");

        let unit = backend
            .create("alpine", "exit 0", MEM_LIMIT, "job-1")
            .await
            .expect("create");
        backend.start(&unit).await.expect("start");

        let status = backend.wait_for_exit(&unit).await.expect("wait");
        assert!(status.success());

        backend.remove(&unit).await.expect("remove");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_codes_are_reported() {
        let backend = ProcessBackend::connect().expect("connect");

        let unit = backend
            .create("alpine", "exit 7", MEM_LIMIT, "job-1")
            .await
            .expect("create");
        backend.start(&unit).await.expect("start");

        let status = backend.wait_for_exit(&unit).await.expect("wait");
        assert_eq!(status.code, 7);

        backend.remove(&unit).await.expect("remove");
    }

    #[tokio::test]
    async fn duplicate_unit_names_conflict() {
        let backend = ProcessBackend::connect().expect("connect");

        backend
            .create("alpine", "true", MEM_LIMIT, "job-1")
            .await
            .expect("first create");
        let err = backend
            .create("alpine", "true", MEM_LIMIT, "job-1")
            .await
            .expect_err("second create with the same name must fail");

        assert!(matches!(err, BackendError::NameConflict(name) if name == "job-1"));
    }

    #[tokio::test]
    async fn name_is_free_again_after_remove() {
        let backend = ProcessBackend::connect().expect("connect");

        let unit = backend
            .create("alpine", "true", MEM_LIMIT, "job-1")
            .await
            .expect("create");
        backend.remove(&unit).await.expect("remove");

        backend
            .create("alpine", "true", MEM_LIMIT, "job-1")
            .await
            .expect("same name usable after removal");
    }

    #[tokio::test]
    async fn waiting_on_an_unstarted_unit_fails() {
        let backend = ProcessBackend::connect().expect("connect");

        let unit = backend
            .create("alpine", "true", MEM_LIMIT, "job-1")
            .await
            .expect("create");

        let err = backend.wait_for_exit(&unit).await.expect_err("not started");
        assert!(matches!(err, BackendError::Wait(_)));
    }

    #[tokio::test]
    async fn unknown_units_are_rejected() {
        let backend = ProcessBackend::connect().expect("connect");
        let bogus = UnitId("no-such-unit".into());

        assert!(matches!(
            backend.start(&bogus).await,
            Err(BackendError::UnknownUnit(_))
        ));
        assert!(matches!(
            backend.remove(&bogus).await,
            Err(BackendError::UnknownUnit(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn removing_a_running_unit_kills_it() {
        let backend = ProcessBackend::connect().expect("connect");

        let unit = backend
            .create("alpine", "sleep 30", MEM_LIMIT, "job-1")
            .await
            .expect("create");
        backend.start(&unit).await.expect("start");

        // Should return promptly instead of waiting out the sleep.
        backend.remove(&unit).await.expect("remove");
    }
}
