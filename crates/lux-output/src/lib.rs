//! lux-output: Universe multiplexing and output plugins
//!
//! Translates the flat channel address space into per-universe, per-plugin
//! operations and implements the global blackout override.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ Scheduler    │────▶│ OutputMap   │────▶│ OutputPlugin     │
//! │              │     │             │     │                  │
//! │ - tick lease │     │ - patches   │     │ - write_range    │
//! │ - dump       │     │ - blackout  │     │ - read_range     │
//! │              │     │ - buffers   │     │ - line names     │
//! └──────────────┘     └─────────────┘     └──────────────────┘
//! ```
//!
//! Every universe is always bound to exactly one plugin output line; the
//! built-in loop-back [`DummyPlugin`] covers unpatched universes.

mod dummy;
mod error;
mod map;
mod plugin;
mod registry;

pub use dummy::*;
pub use error::*;
pub use map::*;
pub use plugin::*;
pub use registry::*;
