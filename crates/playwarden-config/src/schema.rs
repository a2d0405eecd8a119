//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Process names subject to the budget
    #[serde(default)]
    pub tracked: Vec<String>,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Weekly budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<RawBudget>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory holding the usage ledger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Ledger file, relative to data_dir unless absolute (default: time_log.txt)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_file: Option<PathBuf>,

    /// Seconds between samples of the process table; each active sample bills this much
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_period_seconds: Option<u64>,

    /// Milliseconds between enforcement checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce_interval_ms: Option<u64>,

    /// Milliseconds to wait after SIGTERM before SIGKILL (0 kills immediately)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_grace_ms: Option<u64>,

    /// Seconds between usage report log lines (0 disables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_interval_seconds: Option<u64>,
}

/// Weekly budget. Exactly one of the two limit keys must be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBudget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_limit_minutes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_limit_seconds: Option<u64>,
}

impl RawBudget {
    /// Limit in seconds if exactly one key is set
    pub fn limit_seconds(&self) -> Option<u64> {
        match (self.weekly_limit_minutes, self.weekly_limit_seconds) {
            (Some(minutes), None) => Some(minutes.saturating_mul(60)),
            (None, Some(seconds)) => Some(seconds),
            _ => None,
        }
    }
}
