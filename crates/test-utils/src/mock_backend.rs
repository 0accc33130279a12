use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use minisched::backend::{BackendError, ExecutionBackend, ExitStatus, UnitId};

/// One recorded backend call, tagged with the unit name (= task ID).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Create { name: String },
    Start { name: String },
    Stats { name: String },
    Wait { name: String },
    Remove { name: String },
}

impl BackendCall {
    pub fn name(&self) -> &str {
        match self {
            BackendCall::Create { name }
            | BackendCall::Start { name }
            | BackendCall::Stats { name }
            | BackendCall::Wait { name }
            | BackendCall::Remove { name } => name,
        }
    }

    pub fn step(&self) -> &'static str {
        match self {
            BackendCall::Create { .. } => "create",
            BackendCall::Start { .. } => "start",
            BackendCall::Stats { .. } => "stats",
            BackendCall::Wait { .. } => "wait",
            BackendCall::Remove { .. } => "remove",
        }
    }
}

/// A scriptable fake [`ExecutionBackend`] that:
/// - records every call in submission order
/// - can fail any step for selected unit names
/// - tracks how many units are in the started state at once.
///
/// Unit IDs are simply the unit names, so assertions can be written directly
/// against task IDs.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    panic_on_create: HashSet<String>,
    fail_create: HashSet<String>,
    fail_start: HashSet<String>,
    fail_stats: HashSet<String>,
    fail_wait: HashSet<String>,
    fail_remove: HashSet<String>,
    exit_codes: HashMap<String, i64>,
    wait_delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every unit's wait take this long, so runs overlap observably.
    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = delay;
        self
    }

    /// Panic outright when this unit is created, simulating a worker whose
    /// task logic blows up rather than returning an error.
    pub fn with_create_panic(mut self, name: &str) -> Self {
        self.panic_on_create.insert(name.to_string());
        self
    }

    pub fn with_create_failure(mut self, name: &str) -> Self {
        self.fail_create.insert(name.to_string());
        self
    }

    pub fn with_start_failure(mut self, name: &str) -> Self {
        self.fail_start.insert(name.to_string());
        self
    }

    pub fn with_stats_failure(mut self, name: &str) -> Self {
        self.fail_stats.insert(name.to_string());
        self
    }

    pub fn with_wait_error(mut self, name: &str) -> Self {
        self.fail_wait.insert(name.to_string());
        self
    }

    pub fn with_remove_failure(mut self, name: &str) -> Self {
        self.fail_remove.insert(name.to_string());
        self
    }

    pub fn with_exit_code(mut self, name: &str, code: i64) -> Self {
        self.exit_codes.insert(name.to_string(), code);
        self
    }

    /// All recorded calls, in the order the backend received them.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The lifecycle steps one unit went through, in order.
    pub fn steps_for(&self, name: &str) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.name() == name)
            .map(BackendCall::step)
            .collect()
    }

    /// High-water mark of units simultaneously started and not yet exited.
    pub fn max_concurrent_started(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn unit_started(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn unit_stopped(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn create(
        &self,
        _image: &str,
        _command: &str,
        _memory_limit_bytes: u64,
        unit_name: &str,
    ) -> Result<UnitId, BackendError> {
        self.record(BackendCall::Create {
            name: unit_name.to_string(),
        });

        // Recorded first so the call ledger stays usable after the panic.
        if self.panic_on_create.contains(unit_name) {
            panic!("scripted panic while creating unit {unit_name}");
        }
        if self.fail_create.contains(unit_name) {
            return Err(BackendError::NameConflict(unit_name.to_string()));
        }
        Ok(UnitId(unit_name.to_string()))
    }

    async fn start(&self, unit: &UnitId) -> Result<(), BackendError> {
        self.record(BackendCall::Start {
            name: unit.0.clone(),
        });

        if self.fail_start.contains(&unit.0) {
            return Err(BackendError::NotStartable(unit.clone()));
        }
        self.unit_started();
        Ok(())
    }

    async fn stats_snapshot(&self, unit: &UnitId) -> Result<serde_json::Value, BackendError> {
        self.record(BackendCall::Stats {
            name: unit.0.clone(),
        });

        if self.fail_stats.contains(&unit.0) {
            return Err(BackendError::Stats("scripted stats failure".into()));
        }
        Ok(serde_json::json!({
            "memory_stats": { "usage": 42u64 * 1024 * 1024 }
        }))
    }

    async fn wait_for_exit(&self, unit: &UnitId) -> Result<ExitStatus, BackendError> {
        self.record(BackendCall::Wait {
            name: unit.0.clone(),
        });

        if !self.wait_delay.is_zero() {
            tokio::time::sleep(self.wait_delay).await;
        }
        self.unit_stopped();

        if self.fail_wait.contains(&unit.0) {
            return Err(BackendError::Wait("scripted wait error".into()));
        }

        let code = self.exit_codes.get(&unit.0).copied().unwrap_or(0);
        Ok(ExitStatus { code })
    }

    async fn remove(&self, unit: &UnitId) -> Result<(), BackendError> {
        self.record(BackendCall::Remove {
            name: unit.0.clone(),
        });

        if self.fail_remove.contains(&unit.0) {
            return Err(BackendError::UnknownUnit(unit.clone()));
        }
        Ok(())
    }
}
