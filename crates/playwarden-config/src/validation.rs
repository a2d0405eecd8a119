//! Configuration validation

use crate::schema::{RawBudget, RawConfig};
use crate::{DEFAULT_ENFORCE_INTERVAL_MS, DEFAULT_SAMPLE_PERIOD_SECS};
use playwarden_util::MIN_WEEKLY_LIMIT_SECS;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing [budget] section")]
    MissingBudget,

    #[error("Set exactly one of weekly_limit_minutes or weekly_limit_seconds")]
    AmbiguousLimit,

    #[error("Weekly limit {seconds}s is below the minimum of {minimum}s")]
    LimitTooSmall { seconds: u64, minimum: u64 },

    #[error("Weekly limit {seconds}s is shorter than one sample period ({sample_period}s)")]
    LimitBelowSamplePeriod { seconds: u64, sample_period: u64 },

    #[error("No tracked processes configured")]
    NoTrackedProcesses,

    #[error("Tracked process #{index} has an empty name")]
    EmptyProcessName { index: usize },

    #[error("Duplicate tracked process: {0}")]
    DuplicateProcessName(String),

    #[error("Service config error: {0}")]
    ServiceError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let sample_period = config
        .service
        .sample_period_seconds
        .unwrap_or(DEFAULT_SAMPLE_PERIOD_SECS);

    if sample_period == 0 {
        errors.push(ValidationError::ServiceError(
            "sample_period_seconds must be at least 1".into(),
        ));
    }

    if config.service.enforce_interval_ms.unwrap_or(DEFAULT_ENFORCE_INTERVAL_MS) == 0 {
        errors.push(ValidationError::ServiceError(
            "enforce_interval_ms must be at least 1".into(),
        ));
    }

    match &config.budget {
        None => errors.push(ValidationError::MissingBudget),
        Some(budget) => errors.extend(validate_budget(budget, sample_period)),
    }

    errors.extend(validate_tracked(&config.tracked));

    errors
}

fn validate_budget(budget: &RawBudget, sample_period: u64) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let Some(seconds) = budget.limit_seconds() else {
        errors.push(ValidationError::AmbiguousLimit);
        return errors;
    };

    if seconds < MIN_WEEKLY_LIMIT_SECS {
        errors.push(ValidationError::LimitTooSmall {
            seconds,
            minimum: MIN_WEEKLY_LIMIT_SECS,
        });
    } else if sample_period > 0 && seconds < sample_period {
        errors.push(ValidationError::LimitBelowSamplePeriod {
            seconds,
            sample_period,
        });
    }

    errors
}

fn validate_tracked(tracked: &[String]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if tracked.is_empty() {
        errors.push(ValidationError::NoTrackedProcesses);
        return errors;
    }

    let mut seen = HashSet::new();
    for (index, name) in tracked.iter().enumerate() {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            errors.push(ValidationError::EmptyProcessName { index });
            continue;
        }
        if !seen.insert(trimmed.to_lowercase()) {
            errors.push(ValidationError::DuplicateProcessName(trimmed.to_string()));
        }
    }

    errors
}
