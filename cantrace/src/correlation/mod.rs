//! Flow correlation
//!
//! Pairs the enter and exit markers of every pipeline stage per flow:
//! - `classify`: marker name → [`StageTransition`]
//! - `store`: `(device, owner_id)` → [`FlowRecord`] with per-stage timings

pub mod classify;
pub mod store;

pub use classify::{classify, classify_all, Boundary, Stage, StageTransition};
pub use store::{ApplyOutcome, FlowRecord, FlowStore, StageTiming};
