//! # Runner Configuration
//!
//! Construction-time configuration for a [`BatchRunner`](crate::BatchRunner).
//! The four batching options have no sensible universal defaults, so they are
//! required: construction fails with an error naming the first missing field.

use std::time::Duration;

use tokio::runtime::Handle;

use crate::constants::{
    DEFAULT_BUFFER_TIMEOUT_MS, DEFAULT_MAILBOX_CAPACITY, DEFAULT_RUNNER_NAME,
    DEFAULT_SHUTDOWN_TIMEOUT_MS,
};
use crate::error::{BatchRunnerError, Result};

/// Resolved runner configuration.
///
/// Obtained through [`RunnerConfig::builder`]; every instance has passed
/// validation (positive batching bounds, non-zero mailbox depth).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interval between staging-buffer drains.
    pub flush_interval: Duration,
    /// Upper bound on simultaneous handler invocations.
    pub max_concurrency: usize,
    /// Maximum items per batch delivered to the handler.
    pub max_batch_size: usize,
    /// Initial-stream delivery granularity, in items.
    pub init_chunk_size: usize,
    /// Registration name; used in logs and as the telemetry `handler` dimension.
    pub name: String,
    /// Deadline for draining in-flight handlers on shutdown.
    pub shutdown_timeout: Duration,
    /// Default acknowledgement timeout for `buffer`.
    pub buffer_timeout: Duration,
    /// Dispatcher mailbox depth.
    pub mailbox_capacity: usize,
    /// Runtime used to spawn handler and streamer tasks. Defaults to the
    /// runtime the runner is started on.
    pub runtime: Option<Handle>,
}

impl RunnerConfig {
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(BatchRunnerError::Configuration(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(BatchRunnerError::Configuration(
                "max_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.init_chunk_size == 0 {
            return Err(BatchRunnerError::Configuration(
                "init_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(BatchRunnerError::Configuration(
                "mailbox_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`RunnerConfig`].
///
/// Required: `flush_interval`, `max_concurrency`, `max_batch_size`,
/// `init_chunk_size`. Everything else has defaults.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfigBuilder {
    flush_interval: Option<Duration>,
    max_concurrency: Option<usize>,
    max_batch_size: Option<usize>,
    init_chunk_size: Option<usize>,
    name: Option<String>,
    shutdown_timeout: Option<Duration>,
    buffer_timeout: Option<Duration>,
    mailbox_capacity: Option<usize>,
    runtime: Option<Handle>,
}

impl RunnerConfigBuilder {
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    pub fn init_chunk_size(mut self, size: usize) -> Self {
        self.init_chunk_size = Some(size);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub fn buffer_timeout(mut self, timeout: Duration) -> Self {
        self.buffer_timeout = Some(timeout);
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    /// Spawn handler and streamer tasks on a specific runtime instead of the
    /// one the runner is started on.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<RunnerConfig> {
        let flush_interval = self
            .flush_interval
            .ok_or(BatchRunnerError::MissingOption {
                field: "flush_interval",
            })?;
        let max_concurrency = self
            .max_concurrency
            .ok_or(BatchRunnerError::MissingOption {
                field: "max_concurrency",
            })?;
        let max_batch_size = self
            .max_batch_size
            .ok_or(BatchRunnerError::MissingOption {
                field: "max_batch_size",
            })?;
        let init_chunk_size = self
            .init_chunk_size
            .ok_or(BatchRunnerError::MissingOption {
                field: "init_chunk_size",
            })?;

        let config = RunnerConfig {
            flush_interval,
            max_concurrency,
            max_batch_size,
            init_chunk_size,
            name: self
                .name
                .unwrap_or_else(|| DEFAULT_RUNNER_NAME.to_string()),
            shutdown_timeout: self
                .shutdown_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS)),
            buffer_timeout: self
                .buffer_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_BUFFER_TIMEOUT_MS)),
            mailbox_capacity: self.mailbox_capacity.unwrap_or(DEFAULT_MAILBOX_CAPACITY),
            runtime: self.runtime,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_builder() -> RunnerConfigBuilder {
        RunnerConfig::builder()
            .flush_interval(Duration::from_millis(10))
            .max_concurrency(2)
            .max_batch_size(3)
            .init_chunk_size(5)
    }

    #[test]
    fn build_with_required_options() {
        let config = full_builder().build().unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.max_batch_size, 3);
        assert_eq!(config.init_chunk_size, 5);
        assert_eq!(config.name, DEFAULT_RUNNER_NAME);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn missing_options_are_named() {
        let err = RunnerConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("flush_interval"));

        let err = RunnerConfig::builder()
            .flush_interval(Duration::from_millis(10))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));

        let err = RunnerConfig::builder()
            .flush_interval(Duration::from_millis(10))
            .max_concurrency(2)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_batch_size"));

        let err = RunnerConfig::builder()
            .flush_interval(Duration::from_millis(10))
            .max_concurrency(2)
            .max_batch_size(3)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("init_chunk_size"));
    }

    #[test]
    fn zero_values_rejected() {
        assert!(full_builder().max_concurrency(0).build().is_err());
        assert!(full_builder().max_batch_size(0).build().is_err());
        assert!(full_builder().init_chunk_size(0).build().is_err());
        assert!(full_builder().mailbox_capacity(0).build().is_err());
    }

    #[test]
    fn optional_overrides() {
        let config = full_builder()
            .name("balance-fetcher")
            .shutdown_timeout(Duration::from_secs(1))
            .mailbox_capacity(16)
            .build()
            .unwrap();
        assert_eq!(config.name, "balance-fetcher");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.mailbox_capacity, 16);
    }
}
