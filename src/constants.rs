//! Crate-wide defaults and telemetry event names.

/// Default deadline for draining in-flight handlers on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Default acknowledgement timeout used by `BatchRunner::buffer`.
pub const DEFAULT_BUFFER_TIMEOUT_MS: u64 = 5_000;

/// Default dispatcher mailbox depth.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Default registration name when none is configured.
pub const DEFAULT_RUNNER_NAME: &str = "batch-runner";

/// Telemetry fan-out channel depth.
pub const TELEMETRY_CHANNEL_CAPACITY: usize = 256;

/// Telemetry event: items appended to the staging buffer.
pub const EVENT_STAGING_BUFFER_GROW: &str = "staging-buffer.grow";

/// Telemetry event: staging buffer drained by a flush.
pub const EVENT_STAGING_BUFFER_RESET: &str = "staging-buffer.reset";

/// Telemetry event: runner started.
pub const EVENT_RUNNER_STARTED: &str = "runner.started";

/// Telemetry event: runner stopped.
pub const EVENT_RUNNER_STOPPED: &str = "runner.stopped";

/// Telemetry event: initial stream finished enumerating.
pub const EVENT_STREAM_COMPLETED: &str = "stream.completed";
