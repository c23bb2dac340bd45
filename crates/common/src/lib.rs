//! Shared types for the blobworld pipeline: immutable world snapshots and
//! the single-slot mailbox that carries them between threads.
//!
//! # Invariants
//! - A `WorldState` never changes after `StateBuilder::build`.
//! - Mailbox operations never block on anything but a short critical section.

pub mod mailbox;
pub mod types;

pub use glam::Vec2;
pub use mailbox::Mailbox;
pub use types::{StateBuilder, StateError, Wall, WorldState};
