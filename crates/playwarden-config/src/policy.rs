//! Validated policy structures

use crate::schema::{RawBudget, RawConfig, RawServiceConfig};
use crate::{
    CURRENT_CONFIG_VERSION, DEFAULT_ENFORCE_INTERVAL_MS, DEFAULT_KILL_GRACE_MS,
    DEFAULT_REPORT_INTERVAL_SECS, DEFAULT_SAMPLE_PERIOD_SECS,
};
use playwarden_util::{DEFAULT_LEDGER_FILENAME, data_dir_without_env};
use std::path::PathBuf;
use std::time::Duration;

/// Default weekly budget: five hours
pub const DEFAULT_WEEKLY_LIMIT_MINUTES: u64 = 5 * 60;

/// Stock list of game executables written into a fresh config
pub const DEFAULT_TRACKED_PROCESSES: &[&str] = &[
    "minecraft.exe",
    "counterstrike.exe",
    "dota2.exe",
    "leagueoflegends.exe",
    "worldofwarcraft.exe",
    "overwatch.exe",
    "hl2.exe",
    "rainbow6.exe",
    "pubg.exe",
    "fortnite.exe",
    "apexlegends.exe",
    "doometernal.exe",
    "residentevilvillage.exe",
    "valorant.exe",
    "rocketleague.exe",
    "skyrimse.exe",
    "fallout76.exe",
    "fifa22.exe",
    "nba2k22.exe",
    "gta5.exe",
    "reddeadredemption2.exe",
    "battlefield2042.exe",
    "far-cry-6.exe",
    "forza_horizon_5.exe",
    "halo_infinite.exe",
    "deathloop.exe",
    "smite.exe",
];

/// Validated policy ready for use by the supervisor
#[derive(Debug, Clone)]
pub struct Policy {
    pub service: ServiceConfig,
    pub budget: BudgetPolicy,
    /// Tracked process names, trimmed, in configured order
    pub tracked: Vec<String>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let budget = raw
            .budget
            .as_ref()
            .and_then(RawBudget::limit_seconds)
            .map(|seconds| BudgetPolicy {
                weekly_limit: Duration::from_secs(seconds),
            })
            .unwrap_or_default();

        let tracked = raw
            .tracked
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            budget,
            tracked,
        }
    }

    /// Weekly limit in whole seconds
    pub fn weekly_limit_secs(&self) -> u64 {
        self.budget.weekly_limit.as_secs()
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub sample_period: Duration,
    pub enforce_interval: Duration,
    pub kill_grace: Duration,
    /// None disables periodic usage reports
    pub report_interval: Option<Duration>,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let data_dir = raw.data_dir.unwrap_or_else(data_dir_without_env);
        let ledger_file = raw
            .ledger_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILENAME));
        // join() keeps absolute ledger paths as-is
        let ledger_path = data_dir.join(ledger_file);

        let report_secs = raw
            .report_interval_seconds
            .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS);

        Self {
            ledger_path,
            data_dir,
            sample_period: Duration::from_secs(
                raw.sample_period_seconds.unwrap_or(DEFAULT_SAMPLE_PERIOD_SECS),
            ),
            enforce_interval: Duration::from_millis(
                raw.enforce_interval_ms.unwrap_or(DEFAULT_ENFORCE_INTERVAL_MS),
            ),
            kill_grace: Duration::from_millis(raw.kill_grace_ms.unwrap_or(DEFAULT_KILL_GRACE_MS)),
            report_interval: (report_secs > 0).then(|| Duration::from_secs(report_secs)),
        }
    }

    /// Point the data directory somewhere else, moving a relative ledger with it
    pub fn relocate(&mut self, data_dir: PathBuf) {
        if let Ok(relative) = self.ledger_path.strip_prefix(&self.data_dir) {
            self.ledger_path = data_dir.join(relative);
        }
        self.data_dir = data_dir;
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Weekly budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPolicy {
    pub weekly_limit: Duration,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            weekly_limit: Duration::from_secs(DEFAULT_WEEKLY_LIMIT_MINUTES * 60),
        }
    }
}

/// Raw config used for a first-run config file
pub fn default_raw_config() -> RawConfig {
    RawConfig {
        config_version: CURRENT_CONFIG_VERSION,
        service: RawServiceConfig {
            sample_period_seconds: Some(DEFAULT_SAMPLE_PERIOD_SECS),
            report_interval_seconds: Some(DEFAULT_REPORT_INTERVAL_SECS),
            ..Default::default()
        },
        budget: Some(RawBudget {
            weekly_limit_minutes: Some(DEFAULT_WEEKLY_LIMIT_MINUTES),
            weekly_limit_seconds: None,
        }),
        tracked: DEFAULT_TRACKED_PROCESSES
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}
