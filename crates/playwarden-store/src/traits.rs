//! Store trait definitions

use crate::StoreResult;

/// Rolling-window usage ledger.
///
/// Every operation runs under one lock, so an append and a trim never
/// interleave into a corrupted persisted file.
pub trait Ledger: Send + Sync {
    /// Append one tick observed at `now` and persist the full sequence.
    ///
    /// The tick is kept in memory even when persisting fails; the error is
    /// returned so the caller can log it.
    fn record_tick(&self, now: i64) -> StoreResult<()>;

    /// Seconds of usage in the window ending at `now`.
    ///
    /// Drops every entry at or before `now - 7d` and rewrites the persisted
    /// form if anything was dropped. Persist failures are logged, not returned.
    fn used_seconds(&self, now: i64, sample_period: u64) -> u64;

    /// Persist the current sequence unconditionally
    fn flush(&self) -> StoreResult<()>;

    /// Copy of the retained ticks, oldest first
    fn ticks(&self) -> Vec<i64>;

    /// False while the last persist attempt failed
    fn is_healthy(&self) -> bool;
}
