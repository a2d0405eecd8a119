//! Process signalling utilities

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tracing::debug;

use playwarden_host_api::{RegistryError, RegistryResult, StopMode};

/// Interval between liveness checks while waiting for a graceful exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn send(pid: u32, sig: Signal) -> RegistryResult<()> {
    match signal::kill(Pid::from_raw(pid as i32), sig) {
        Ok(()) => {
            debug!(pid = pid, signal = ?sig, "Signal sent");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            // Process already gone
            Ok(())
        }
        Err(Errno::EPERM) => Err(RegistryError::PermissionDenied(format!(
            "Not allowed to send {:?} to pid {}",
            sig, pid
        ))),
        Err(e) => Err(RegistryError::SignalFailed(format!(
            "Failed to send {:?} to pid {}: {}",
            sig, pid, e
        ))),
    }
}

/// Send SIGTERM to a single process
pub fn send_sigterm(pid: u32) -> RegistryResult<()> {
    send(pid, Signal::SIGTERM)
}

/// Send SIGKILL to a single process
pub fn send_sigkill(pid: u32) -> RegistryResult<()> {
    send(pid, Signal::SIGKILL)
}

/// Check whether a pid still exists (zombies included)
pub fn is_alive(pid: u32) -> bool {
    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // Exists but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Terminate one process according to `mode`.
///
/// Graceful mode sends SIGTERM and escalates to SIGKILL if the process is
/// still present after the timeout.
pub async fn terminate(pid: u32, mode: StopMode) -> RegistryResult<()> {
    match mode {
        StopMode::Force => send_sigkill(pid),
        StopMode::Graceful { timeout } => {
            send_sigterm(pid)?;

            let mut waited = Duration::ZERO;
            while waited < timeout {
                if !is_alive(pid) {
                    return Ok(());
                }
                tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                waited += EXIT_POLL_INTERVAL;
            }

            if is_alive(pid) {
                debug!(pid = pid, waited_ms = waited.as_millis() as u64, "Escalating to SIGKILL");
                send_sigkill(pid)?;
            }
            Ok(())
        }
    }
}
