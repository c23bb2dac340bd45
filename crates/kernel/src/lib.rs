//! World Kernel: the rigid-body world, stepped at a fixed timestep.
//!
//! # Invariants
//! - Stepping is deterministic given the same initial state and the same
//!   sequence of velocity commands.
//! - Every step ends with a fresh, immutable `WorldState`; a step that yields
//!   non-finite positions is a fault, never a published state.
//! - Callers never see physics internals (bodies, shapes, solver state).

pub mod config;
pub mod world;

pub use config::WorldConfig;
pub use world::{FieldEvent, KernelError, Simulation, WorldModel};
