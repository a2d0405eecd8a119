//! Shared utilities for playwarden
//!
//! This crate provides:
//! - Clock helpers (Unix seconds, mock time for development)
//! - Rolling-window constants and arithmetic
//! - Error types shared by the core
//! - Default paths for config, data, and the usage ledger

mod error;
mod paths;
mod time;

pub use error::*;
pub use paths::*;
pub use time::*;
