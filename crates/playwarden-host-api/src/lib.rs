//! Process registry trait interfaces for playwarden
//!
//! This crate defines the interface between the enforcement core and the
//! operating system's process table. It contains no platform code itself.

mod matching;
mod mock;
mod traits;

pub use matching::*;
pub use mock::*;
pub use traits::*;
