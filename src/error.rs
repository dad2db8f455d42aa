//! Error types for the batch runner.

/// Errors surfaced by runner construction and the public operations.
///
/// Recoverable handler faults (a batch asking to be retried, or a handler
/// task panicking) never appear here; they are absorbed by the dispatcher
/// and visible only through logs and [`crate::runner::RunnerMetrics`].
#[derive(Debug, thiserror::Error)]
pub enum BatchRunnerError {
    #[error("configuration error: missing required option `{field}`")]
    MissingOption { field: &'static str },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("buffer request timed out after {timeout_ms}ms")]
    BufferTimeout { timeout_ms: u64 },

    #[error("batch runner is shutting down")]
    ShuttingDown,

    #[error("item stream failed: {0}")]
    Streamer(String),
}

pub type Result<T> = std::result::Result<T, BatchRunnerError>;
