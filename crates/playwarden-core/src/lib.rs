//! Core enforcement engine for playwarden
//!
//! This crate is the heart of playwarden, containing:
//! - The sampler that bills one tick per period while a tracked process runs
//! - The enforcement state machine (within budget, newly over, graced, enforced)
//! - The supervisor that owns both loops and the usage ledger

mod enforcer;
mod events;
mod sampler;
mod supervisor;

pub use enforcer::*;
pub use events::*;
pub use sampler::*;
pub use supervisor::*;
