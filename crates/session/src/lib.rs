//! Session: the dedicated simulation thread and its lifecycle.
//!
//! # Invariants
//! - The simulation thread is the only owner of the `WorldModel` while running.
//! - Snapshots reach other threads only through the state mailbox.
//! - A step always runs to completion; pause and terminate take effect
//!   before the next one.
//! - Terminate joins the thread before returning.

mod sim_loop;

pub use sim_loop::{LoopError, LoopState, SessionConfig, SimulationLoop};
