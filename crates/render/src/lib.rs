//! Rendering adapter: draws published world snapshots.
//!
//! # Invariants
//! - A renderer only ever sees `WorldState` values, never physics internals.
//! - The consumer thread is read-only; it takes from the state mailbox and
//!   writes nothing back.
//! - No new snapshot means no redraw.

mod pump;
mod renderer;

pub use pump::FramePump;
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
