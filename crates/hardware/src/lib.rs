//! Decoupled fetch front-end for a cycle-level out-of-order CPU simulator.
//!
//! This crate models the branch-prediction-driven fetch engine that runs ahead
//! of the instruction cache. It provides:
//! 1. **Fetch targets:** Contiguous runs of micro-ops sharing one I-cache fetch window.
//! 2. **Fetch target queue (FTQ):** Bounded FIFO between the producer and the I-cache.
//! 3. **Producer:** Per-cycle loop that pulls ops upstream, predicts control flow, and composes FTs.
//! 4. **Iterators:** Lookahead cursors over the FTQ for fetch-directed prefetching.
//! 5. **Recovery:** Misprediction rollback, op release, and adaptive FTQ depth resizing.
//! 6. **Simulation:** Instruction sources, workload descriptions, and the enclosing cycle loop.

/// Common types shared across the crate.
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Front-end core (ops, op pool, FTQ, branch prediction units).
pub mod core;
/// Instruction sources, workload input, and the enclosing simulator loop.
pub mod sim;
/// Front-end statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The decoupled fetch front-end; produce with `tick`, consume with `fetch_op`.
pub use crate::core::frontend::DecoupledFrontend;
/// Top-level simulator; owns the front-end and its collaborators side by side.
pub use crate::sim::simulator::{Core, Simulator};
