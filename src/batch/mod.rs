//! Coalescing of messages into size- or time-bounded batches.

mod batcher;

pub use batcher::{BatchHandler, Batcher};
