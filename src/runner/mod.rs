//! # Buffered Batch Task Runner
//!
//! Coordinates three independent pressure sources: a one-shot enumeration of
//! pre-existing pending items, ad-hoc asynchronous submissions from
//! producers, and a bounded pool of handler invocations with variable
//! latency. Items are grouped into size-bounded batches, executed with a
//! capped degree of parallelism, and requeued with retry accounting when a
//! handler fails or asks for another attempt.

pub mod core;
pub(crate) mod dispatcher;
pub mod handler;
pub mod metrics;
pub(crate) mod queue;
pub(crate) mod streamer;

pub use core::BatchRunner;
pub use handler::{BatchHandler, BatchOutcome, ItemSink};
pub use metrics::RunnerMetrics;
