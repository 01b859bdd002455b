//! Core engine: snapshot assembly, cycle deltas, and the two monitor loops.

pub mod delta;
pub mod market;
pub mod monitor;
pub mod scheduler;
