//! Weekly usage report shared by `playwardend status` and the periodic log line

use playwarden_util::{format_duration, format_unix_seconds, window_start};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub used_seconds: u64,
    pub limit_seconds: u64,
    pub remaining_seconds: u64,
    pub over_limit: bool,
    /// When the oldest counted tick ages out of the window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<PathBuf>,
}

impl UsageReport {
    pub fn new(used_seconds: u64, limit_seconds: u64) -> Self {
        Self {
            used_seconds,
            limit_seconds,
            remaining_seconds: limit_seconds.saturating_sub(used_seconds),
            over_limit: used_seconds >= limit_seconds,
            next_expiry: None,
            ledger: None,
        }
    }

    /// Build a report from raw ledger ticks without trimming them
    pub fn from_ticks(ticks: &[i64], now: i64, sample_period: u64, limit_seconds: u64) -> Self {
        let start = window_start(now);
        let counted: Vec<i64> = ticks.iter().copied().filter(|&t| t > start).collect();
        let used = (counted.len() as u64).saturating_mul(sample_period);

        let mut report = Self::new(used, limit_seconds);
        report.next_expiry = counted
            .iter()
            .min()
            .map(|&oldest| format_unix_seconds(oldest + playwarden_util::ROLLING_WINDOW_SECS));
        report
    }

    pub fn with_ledger(mut self, path: PathBuf) -> Self {
        self.ledger = Some(path);
        self
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Weekly playtime: {} of {} ({} remaining)",
            format_duration(Duration::from_secs(self.used_seconds)),
            format_duration(Duration::from_secs(self.limit_seconds)),
            format_duration(Duration::from_secs(self.remaining_seconds)),
        )?;
        if self.over_limit {
            write!(f, " [limit reached]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn remaining_saturates() {
        let report = UsageReport::new(90, 60);
        assert_eq!(report.remaining_seconds, 0);
        assert!(report.over_limit);
    }

    #[test]
    fn from_ticks_ignores_aged_out_entries() {
        let window = playwarden_util::ROLLING_WINDOW_SECS;
        let ticks = [NOW - window - 5, NOW - window, NOW - 10, NOW - 9, NOW];
        let report = UsageReport::from_ticks(&ticks, NOW, 2, 3600);
        assert_eq!(report.used_seconds, 6);
        assert_eq!(report.remaining_seconds, 3594);
        assert!(!report.over_limit);
        assert_eq!(report.next_expiry, Some(format_unix_seconds(NOW - 10 + window)));
    }

    #[test]
    fn display_formats_durations() {
        let report = UsageReport::new(3661, 5 * 3600);
        assert_eq!(
            report.to_string(),
            "Weekly playtime: 1h 1m 1s of 5h 0m 0s (3h 58m 59s remaining)"
        );
        assert!(UsageReport::new(60, 60).to_string().ends_with("[limit reached]"));
    }

    #[test]
    fn json_omits_missing_fields() {
        let json = serde_json::to_value(UsageReport::new(30, 60)).unwrap();
        assert_eq!(json["used_seconds"], 30);
        assert_eq!(json["remaining_seconds"], 30);
        assert!(json.get("ledger").is_none());
    }
}
