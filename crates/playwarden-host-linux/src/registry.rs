//! Linux process registry implementation

use async_trait::async_trait;
use playwarden_host_api::{ProcessRegistry, StopMode, process_name_matches};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{Process, ProcessStatus, System};
use tracing::{debug, info, warn};

use crate::process::terminate;

/// Process table snapshots younger than this are reused across lookups
const SNAPSHOT_MAX_AGE: Duration = Duration::from_millis(50);

struct Snapshot {
    system: System,
    refreshed_at: Option<Instant>,
}

/// Process registry backed by the live process table.
///
/// `/proc/<pid>/stat` truncates names to 15 bytes, so the executable's file
/// name is also checked when it is readable.
pub struct SystemRegistry {
    snapshot: Mutex<Snapshot>,
    stop_mode: StopMode,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::with_stop_mode(StopMode::default())
    }

    pub fn with_stop_mode(stop_mode: StopMode) -> Self {
        Self {
            snapshot: Mutex::new(Snapshot {
                system: System::new(),
                refreshed_at: None,
            }),
            stop_mode,
        }
    }

    /// Pids of live processes matching `name`, refreshing a stale snapshot first
    fn matching_pids(&self, name: &str) -> Vec<u32> {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = snapshot
            .refreshed_at
            .is_some_and(|at| at.elapsed() < SNAPSHOT_MAX_AGE);
        if !fresh {
            snapshot.system.refresh_processes();
            snapshot.refreshed_at = Some(Instant::now());
        }

        let own_pid = std::process::id();
        snapshot
            .system
            .processes()
            .iter()
            .filter(|(pid, process)| {
                pid.as_u32() != own_pid && is_live(process) && process_matches(name, process)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    /// Force the next lookup to rescan the process table
    fn invalidate(&self) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        snapshot.refreshed_at = None;
    }
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_live(process: &Process) -> bool {
    !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

fn process_matches(name: &str, process: &Process) -> bool {
    if process_name_matches(name, process.name()) {
        return true;
    }

    process
        .exe()
        .and_then(|exe| exe.file_name())
        .and_then(|file_name| file_name.to_str())
        .is_some_and(|file_name| process_name_matches(name, file_name))
}

#[async_trait]
impl ProcessRegistry for SystemRegistry {
    async fn is_running(&self, name: &str) -> bool {
        !self.matching_pids(name).is_empty()
    }

    async fn kill(&self, name: &str) -> bool {
        let pids = self.matching_pids(name);
        if pids.is_empty() {
            debug!(name = %name, "No matching process to kill");
            return false;
        }

        let mut success = true;
        for pid in pids {
            match terminate(pid, self.stop_mode).await {
                Ok(()) => {
                    info!(name = %name, pid = pid, "Tracked process terminated");
                }
                Err(e) => {
                    warn!(name = %name, pid = pid, error = %e, "Failed to terminate tracked process");
                    success = false;
                }
            }
        }

        self.invalidate();
        success
    }
}
