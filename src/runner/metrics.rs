//! Metrics snapshots for the runner.

use serde::Serialize;

/// Point-in-time view of runner state, returned by
/// [`BatchRunner::metrics`](crate::BatchRunner::metrics).
///
/// `buffer_gauge` and `task_gauge` are the two load signals producers consult
/// for backpressure; the remaining fields are cumulative counters maintained
/// by the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerMetrics {
    /// Registration name of the runner.
    pub name: String,
    /// Staged items plus queued batches weighted by `max_batch_size`.
    pub buffer_gauge: usize,
    /// Handler invocations currently in flight.
    pub task_gauge: usize,
    /// Batches awaiting dispatch.
    pub batch_queue_len: usize,
    /// Items staged and not yet flushed.
    pub staged_items: usize,
    /// Handler invocations started since the runner was created.
    pub batches_dispatched: u64,
    /// Invocations that returned `Ok`.
    pub batches_succeeded: u64,
    /// Requeues from `Retry`, `RetryWith`, or a crash.
    pub batches_retried: u64,
    /// Handler tasks that terminated abnormally.
    pub handler_crashes: u64,
    /// Items delivered by the initial stream.
    pub items_streamed: u64,
    /// Items accepted through `buffer`.
    pub items_buffered: u64,
    /// Whether the initial stream has finished enumerating.
    pub stream_complete: bool,
    /// Milliseconds since the runner started.
    pub uptime_ms: u64,
}

/// Cumulative counters owned by the dispatcher.
#[derive(Debug, Default)]
pub(crate) struct RunnerCounters {
    pub batches_dispatched: u64,
    pub batches_succeeded: u64,
    pub batches_retried: u64,
    pub handler_crashes: u64,
    pub items_streamed: u64,
    pub items_buffered: u64,
}
