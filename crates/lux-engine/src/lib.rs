//! lux-engine: Soft-real-time lighting scheduler
//!
//! Advances running functions at a fixed tick rate and commits their
//! combined output through the universe multiplexer:
//! - `Bus`: shared named timing values consulted by functions
//! - `Function`: the schedulable per-tick write contract
//! - `MasterTimer`: the dedicated tick thread and running-set lifecycle
//! - `LightingEngine`: top-level context wiring everything together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   UI / input threads                 Scheduler thread            │
//! │   ┌──────────────────┐              ┌─────────────────────┐     │
//! │   │ start_function() │──locked──────▶ tick:               │     │
//! │   │ stop_function()  │   list       │  claim lease        │     │
//! │   │ set_value()      │              │  f.write() per fn   │     │
//! │   │ set_blackout()   │              │  dump_universes()   │     │
//! │   └──────────────────┘              └─────────────────────┘     │
//! │            │                                  │                  │
//! │            ▼                                  ▼                  │
//! │        ┌───────┐                        ┌───────────┐           │
//! │        │  Bus  │◀──value(id) per tick───│ Functions │           │
//! │        └───────┘                        └───────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod bus;
mod engine;
mod error;
mod function;
mod timer;

pub use bus::*;
pub use engine::*;
pub use error::*;
pub use function::*;
pub use timer::*;
