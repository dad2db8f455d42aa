//! # Runner Handle
//!
//! [`BatchRunner`] is the public face of the runner: a cheaply cloneable
//! handle over the dispatcher's mailbox. `start` constructs the dispatcher,
//! schedules the initial stream and the first flush, and returns immediately;
//! all subsequent operations are messages.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::RunnerConfig;
use crate::constants::TELEMETRY_CHANNEL_CAPACITY;
use crate::error::{BatchRunnerError, Result};
use crate::events::{RunnerTelemetry, TelemetryEvent};
use crate::runner::dispatcher::{Dispatcher, RunnerMessage};
use crate::runner::handler::BatchHandler;
use crate::runner::metrics::RunnerMetrics;

/// Handle to a running buffered batch task runner.
///
/// Clones share the same runner. When the last handle is dropped without an
/// explicit [`shutdown`](Self::shutdown), a shutdown is requested so the
/// dispatcher does not outlive its users.
pub struct BatchRunner<H: BatchHandler> {
    shared: Arc<RunnerShared<H::Item>>,
    telemetry: RunnerTelemetry,
}

impl<H: BatchHandler> std::fmt::Debug for BatchRunner<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner").finish_non_exhaustive()
    }
}

impl<H: BatchHandler> Clone for BatchRunner<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            telemetry: self.telemetry.clone(),
        }
    }
}

struct RunnerShared<T> {
    tx: mpsc::Sender<RunnerMessage<T>>,
    name: String,
    buffer_timeout: Duration,
}

impl<T> Drop for RunnerShared<T> {
    fn drop(&mut self) {
        let (reply, _ignored) = oneshot::channel();
        let _ = self.tx.try_send(RunnerMessage::Shutdown { reply });
    }
}

impl<H: BatchHandler> BatchRunner<H> {
    /// Construct and start a runner.
    ///
    /// Fails when the configuration is invalid or when no tokio runtime is
    /// available to spawn on. The initial streamer is scheduled as the first
    /// message the dispatcher processes.
    pub fn start(handler: H, config: RunnerConfig) -> Result<Self> {
        config.validate()?;

        let runtime = match &config.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| {
                BatchRunnerError::Configuration(
                    "start requires a tokio runtime (current or configured)".to_string(),
                )
            })?,
        };

        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let telemetry = RunnerTelemetry::new(&config.name, TELEMETRY_CHANNEL_CAPACITY);
        let name = config.name.clone();
        let buffer_timeout = config.buffer_timeout;

        let dispatcher = Dispatcher::new(
            Arc::new(handler),
            config,
            runtime.clone(),
            rx,
            tx.clone(),
            telemetry.clone(),
        );

        // Startup tick. The mailbox is fresh with non-zero capacity, so this
        // cannot be rejected.
        let _ = tx.try_send(RunnerMessage::StartStream);

        runtime.spawn(dispatcher.run());

        Ok(Self {
            shared: Arc::new(RunnerShared {
                tx,
                name,
                buffer_timeout,
            }),
            telemetry,
        })
    }

    /// Stage items for batching, with the configured acknowledgement timeout.
    ///
    /// Constant-time for the producer regardless of how many items are
    /// submitted; never blocks on handler throughput.
    pub async fn buffer(&self, items: Vec<H::Item>) -> Result<()> {
        self.buffer_timeout(items, self.shared.buffer_timeout).await
    }

    /// Stage items with a caller-supplied acknowledgement timeout.
    pub async fn buffer_timeout(&self, items: Vec<H::Item>, timeout: Duration) -> Result<()> {
        let timeout_ms = timeout.as_millis() as u64;
        let (ack, acked) = oneshot::channel();

        let submit = async {
            self.shared
                .tx
                .send(RunnerMessage::Buffer { items, ack })
                .await
                .map_err(|_| BatchRunnerError::ShuttingDown)?;
            acked.await.map_err(|_| BatchRunnerError::ShuttingDown)
        };

        match tokio::time::timeout(timeout, submit).await {
            Ok(result) => result,
            Err(_) => Err(BatchRunnerError::BufferTimeout { timeout_ms }),
        }
    }

    /// Snapshot of the runner's gauges and counters.
    pub async fn metrics(&self) -> Result<RunnerMetrics> {
        let (reply, snapshot) = oneshot::channel();
        self.shared
            .tx
            .send(RunnerMessage::Metrics { reply })
            .await
            .map_err(|_| BatchRunnerError::ShuttingDown)?;
        snapshot.await.map_err(|_| BatchRunnerError::ShuttingDown)
    }

    /// Subscribe to the runner's telemetry events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }

    /// Registration name of this runner.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Graceful shutdown: stop timers, cancel the initial streamer, and wait
    /// for in-flight handlers up to the configured deadline.
    ///
    /// Idempotent; a runner that has already stopped reports success.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, stopped) = oneshot::channel();
        if self
            .shared
            .tx
            .send(RunnerMessage::Shutdown { reply })
            .await
            .is_err()
        {
            return Ok(());
        }
        let _ = stopped.await;
        Ok(())
    }
}
