//! Persistence layer for playwarden
//!
//! Provides the usage ledger: one Unix timestamp per sampling tick in which a
//! tracked process was running, trimmed to the trailing seven days and kept
//! on disk as plain text.

mod file;
mod traits;

pub use file::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed ledger line {line}: {value:?}")]
    Malformed { line: usize, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
