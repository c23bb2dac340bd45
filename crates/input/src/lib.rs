//! Input path: raw samples from any thread become the avatar's velocity command.
//!
//! # Invariants
//! - Producers never block on consumers; only the newest command is kept.
//! - A command persists until replaced, so every tick can reapply it.
//! - Rejected samples leave the current command untouched.

pub mod aggregator;
pub mod sample;

pub use aggregator::{InputAggregator, InputConfig};
pub use sample::{InputError, Orientation, SourceKind};
