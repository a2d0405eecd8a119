//! Plain-text ledger implementation

use playwarden_util::window_start;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{Ledger, StoreError, StoreResult};

/// Minimum ledger time between persist retries made by usage queries
pub const PERSIST_RETRY_SECS: i64 = 5;

#[derive(Debug, Default)]
struct LedgerState {
    ticks: Vec<i64>,
    /// Set when memory holds changes the file does not
    dirty: bool,
    /// Ledger time of the last retry made by a usage query
    last_retry: Option<i64>,
}

/// Ledger persisted as one decimal Unix timestamp per line.
///
/// Writes go to a sibling temporary file that is renamed over the log, so the
/// file on disk is always a complete snapshot of the in-memory sequence.
pub struct FileLedger {
    path: Option<PathBuf>,
    state: Mutex<LedgerState>,
}

impl FileLedger {
    /// Open the ledger at `path`.
    ///
    /// Never fails: a missing, unreadable or malformed file yields an empty
    /// ledger, so the budget restarts from zero usage.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let ticks = match load_ticks(&path) {
            Ok(ticks) => {
                info!(path = %path.display(), entries = ticks.len(), "Usage ledger loaded");
                ticks
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No usage ledger yet, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable usage ledger");
                Vec::new()
            }
        };

        Self {
            path: Some(path),
            state: Mutex::new(LedgerState {
                ticks,
                ..LedgerState::default()
            }),
        }
    }

    /// Create a ledger that is never written to disk (for testing)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write `state` to disk. Caller holds the lock.
    ///
    /// Warns once when persisting starts failing and logs the recovery;
    /// failures in between are left to the caller.
    fn persist(&self, state: &mut LedgerState) -> StoreResult<()> {
        let Some(path) = &self.path else {
            state.dirty = false;
            return Ok(());
        };

        match write_ticks(path, &state.ticks) {
            Ok(()) => {
                if state.dirty {
                    info!(path = %path.display(), entries = state.ticks.len(), "Usage ledger persisted again");
                } else {
                    debug!(path = %path.display(), entries = state.ticks.len(), "Usage ledger persisted");
                }
                state.dirty = false;
                state.last_retry = None;
                Ok(())
            }
            Err(e) => {
                if !state.dirty {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to persist usage ledger; keeping usage in memory"
                    );
                }
                state.dirty = true;
                Err(e)
            }
        }
    }
}

/// Parse the ledger file. Blank lines are skipped; any other non-integer
/// line rejects the whole file.
pub fn parse_ticks(content: &str) -> StoreResult<Vec<i64>> {
    let mut ticks = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tick = line.parse::<i64>().map_err(|_| StoreError::Malformed {
            line: idx + 1,
            value: line.to_string(),
        })?;
        ticks.push(tick);
    }
    Ok(ticks)
}

fn load_ticks(path: &Path) -> StoreResult<Vec<i64>> {
    let content = fs::read_to_string(path)?;
    parse_ticks(&content)
}

fn write_ticks(path: &Path, ticks: &[i64]) -> StoreResult<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)?;
        let mut buf = String::with_capacity(ticks.len() * 11);
        for tick in ticks {
            buf.push_str(&tick.to_string());
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl Ledger for FileLedger {
    fn record_tick(&self, now: i64) -> StoreResult<()> {
        let mut state = self.lock();
        state.ticks.push(now);
        self.persist(&mut state)
    }

    fn used_seconds(&self, now: i64, sample_period: u64) -> u64 {
        let mut state = self.lock();

        let cutoff = window_start(now);
        let before = state.ticks.len();
        state.ticks.retain(|&tick| tick > cutoff);
        let evicted = before - state.ticks.len();

        if evicted > 0 {
            debug!(evicted, retained = state.ticks.len(), "Aged ticks out of the window");
        }

        let retry_due = state.dirty
            && state
                .last_retry
                .is_none_or(|at| now - at >= PERSIST_RETRY_SECS);
        if evicted > 0 || retry_due {
            if state.dirty {
                state.last_retry = Some(now);
            }
            if let Err(e) = self.persist(&mut state) {
                debug!(error = %e, "Usage ledger still not persisted");
            }
        }

        state.ticks.len() as u64 * sample_period
    }

    fn flush(&self) -> StoreResult<()> {
        let mut state = self.lock();
        self.persist(&mut state)
    }

    fn ticks(&self) -> Vec<i64> {
        self.lock().ticks.clone()
    }

    fn is_healthy(&self) -> bool {
        !self.lock().dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playwarden_util::ROLLING_WINDOW_SECS;

    const T0: i64 = 1_700_000_000;

    fn ledger_in(dir: &tempfile::TempDir) -> (FileLedger, PathBuf) {
        let path = dir.path().join("time_log.txt");
        (FileLedger::open(&path), path)
    }

    #[test]
    fn records_and_counts_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, path) = ledger_in(&dir);

        for i in 0..59 {
            ledger.record_tick(T0 + i).unwrap();
        }

        assert_eq!(ledger.used_seconds(T0 + 59, 1), 59);
        assert_eq!(ledger.used_seconds(T0 + 59, 10), 590);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 59);
        assert_eq!(content.lines().next().unwrap(), T0.to_string());
    }

    #[test]
    fn duplicate_ticks_each_count() {
        let ledger = FileLedger::in_memory();
        ledger.record_tick(T0).unwrap();
        ledger.record_tick(T0).unwrap();
        assert_eq!(ledger.used_seconds(T0, 1), 2);
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let ledger = FileLedger::in_memory();
        let now = T0 + ROLLING_WINDOW_SECS;

        ledger.record_tick(T0).unwrap(); // exactly now - 7d: dropped
        ledger.record_tick(T0 + 1).unwrap(); // kept

        assert_eq!(ledger.used_seconds(now, 1), 1);
        assert_eq!(ledger.ticks(), vec![T0 + 1]);
    }

    #[test]
    fn never_counts_ticks_older_than_window() {
        let ledger = FileLedger::in_memory();
        for i in 0..100 {
            ledger.record_tick(T0 + i * 3600).unwrap();
        }

        for step in 0..400 {
            let now = T0 + step * 3600;
            let used = ledger.used_seconds(now, 1);
            assert!(ledger.ticks().iter().all(|&t| t > now - ROLLING_WINDOW_SECS));
            assert_eq!(used, ledger.ticks().len() as u64);
        }
        assert_eq!(ledger.used_seconds(T0 + 400 * 3600, 1), 0);
    }

    #[test]
    fn trim_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, path) = ledger_in(&dir);

        ledger.record_tick(T0).unwrap();
        ledger.record_tick(T0 + 10).unwrap();

        assert_eq!(ledger.used_seconds(T0 + ROLLING_WINDOW_SECS + 5, 1), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", T0 + 10));
    }

    #[test]
    fn repeated_query_is_idempotent_and_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, path) = ledger_in(&dir);

        ledger.record_tick(T0).unwrap();
        ledger.record_tick(T0 + 1).unwrap();

        let now = T0 + ROLLING_WINDOW_SECS; // evicts T0
        let first = ledger.used_seconds(now, 1);
        let snapshot = fs::read_to_string(&path).unwrap();

        // A second query with nothing to evict must not touch the file
        fs::remove_file(&path).unwrap();
        let second = ledger.used_seconds(now, 1);

        assert_eq!(first, second);
        assert!(!path.exists());
        assert_eq!(snapshot, format!("{}\n", T0 + 1));
    }

    #[test]
    fn round_trip_through_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, path) = ledger_in(&dir);

        let ticks: Vec<i64> = (0..25).map(|i| T0 + i * 7).collect();
        for &t in &ticks {
            ledger.record_tick(t).unwrap();
        }
        ledger.flush().unwrap();
        drop(ledger);

        let reopened = FileLedger::open(&path);
        assert_eq!(reopened.ticks(), ticks);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, path) = ledger_in(&dir);
        assert!(ledger.ticks().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_log.txt");
        fs::write(&path, format!("{}\nnot-a-number\n{}\n", T0, T0 + 1)).unwrap();

        let ledger = FileLedger::open(&path);
        assert!(ledger.ticks().is_empty());
        assert_eq!(ledger.used_seconds(T0 + 2, 1), 0);
    }

    #[test]
    fn trailing_blank_lines_are_tolerated() {
        let parsed = parse_ticks(&format!("{}\n{}\n\n\n", T0, T0 + 1)).unwrap();
        assert_eq!(parsed, vec![T0, T0 + 1]);
    }

    #[test]
    fn parse_reports_offending_line() {
        let err = parse_ticks("1\n2\n3.5\n").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { line: 3, .. }));
    }

    #[test]
    fn unwritable_path_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("time_log.txt");
        let ledger = FileLedger::open(&path);

        assert!(ledger.record_tick(T0).is_err());
        assert!(!ledger.is_healthy());
        assert_eq!(ledger.used_seconds(T0 + 1, 1), 1);

        // Once the directory exists the next due retry catches the file up
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        assert_eq!(ledger.used_seconds(T0 + 1 + PERSIST_RETRY_SECS, 1), 1);
        assert!(ledger.is_healthy());
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", T0));
    }

    #[test]
    fn queries_retry_failed_persist_at_a_bounded_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("time_log.txt");
        let ledger = FileLedger::open(&path);

        assert!(ledger.record_tick(T0).is_err());
        ledger.used_seconds(T0, 1);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Queries inside the retry interval leave the disk alone
        for _ in 0..50 {
            assert_eq!(ledger.used_seconds(T0 + PERSIST_RETRY_SECS - 1, 1), 1);
        }
        assert!(!ledger.is_healthy());
        assert!(!path.exists());

        assert_eq!(ledger.used_seconds(T0 + PERSIST_RETRY_SECS, 1), 1);
        assert!(ledger.is_healthy());
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", T0));
    }

    #[test]
    fn record_tick_retries_persist_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("time_log.txt");
        let ledger = FileLedger::open(&path);

        assert!(ledger.record_tick(T0).is_err());
        ledger.used_seconds(T0, 1);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        ledger.record_tick(T0 + 1).unwrap();
        assert!(ledger.is_healthy());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n{}\n", T0, T0 + 1)
        );
    }
}
