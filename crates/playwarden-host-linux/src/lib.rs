//! Linux process registry for playwarden
//!
//! Provides:
//! - Process table scanning by name (via sysinfo)
//! - Graceful (SIGTERM) and forceful (SIGKILL) termination
//! - Permission failures reported as a failed kill, never as a panic

mod process;
mod registry;

pub use process::*;
pub use registry::*;
