//! # Dispatcher
//!
//! The single-owner coordinator. All mutable runner state (batch queue,
//! staging buffer, handler task pool, streamer status) is confined to this
//! actor; producers, handler tasks, and the streamer reach it exclusively
//! through its mailbox, so message handling needs no locks.
//!
//! A dispatch attempt runs after every state-changing message: while the
//! pool is below `max_concurrency` and the queue is non-empty, the head
//! record is handed to a fresh handler invocation. Handler tasks are paired
//! with a supervisor task that awaits their `JoinHandle` and posts the
//! outcome (or the panic) back to the mailbox, so a crashed invocation is
//! indistinguishable from a voluntary retry for recovery purposes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::constants::{
    EVENT_RUNNER_STARTED, EVENT_RUNNER_STOPPED, EVENT_STAGING_BUFFER_GROW,
    EVENT_STAGING_BUFFER_RESET, EVENT_STREAM_COMPLETED,
};
use crate::events::RunnerTelemetry;
use crate::runner::handler::{BatchHandler, BatchOutcome};
use crate::runner::metrics::{RunnerCounters, RunnerMetrics};
use crate::runner::queue::{BatchQueue, BatchRecord, StagingBuffer};
use crate::runner::streamer;

/// Messages accepted by the dispatcher.
pub(crate) enum RunnerMessage<T> {
    /// Append `items` to the staging buffer and acknowledge.
    Buffer {
        items: Vec<T>,
        ack: oneshot::Sender<()>,
    },
    /// Splice a streamer-built sub-queue onto the batch queue tail.
    Enqueue { batches: VecDeque<BatchRecord<T>> },
    /// Startup tick: start the initial streamer.
    StartStream,
    /// A handler invocation completed and reported an outcome.
    HandlerDone { token: Uuid, outcome: BatchOutcome<T> },
    /// A supervised task terminated without reporting an outcome. `None`
    /// is the streamer finishing normally; `Some` carries the join error
    /// of a crashed task.
    TaskExited { token: Uuid, error: Option<String> },
    /// Snapshot request.
    Metrics { reply: oneshot::Sender<RunnerMetrics> },
    /// Graceful stop: drain in-flight handlers up to the shutdown deadline.
    Shutdown { reply: oneshot::Sender<()> },
}

enum StreamerState {
    NotStarted,
    Running { token: Uuid, abort: AbortHandle },
    Complete,
}

pub(crate) struct Dispatcher<H: BatchHandler> {
    handler: Arc<H>,
    config: RunnerConfig,
    runtime: Handle,
    rx: mpsc::Receiver<RunnerMessage<H::Item>>,
    /// Handed to spawned tasks so they can post outcomes back.
    self_tx: mpsc::Sender<RunnerMessage<H::Item>>,
    queue: BatchQueue<H::Item>,
    staging: StagingBuffer<H::Item>,
    pool: HashMap<Uuid, BatchRecord<H::Item>>,
    streamer: StreamerState,
    counters: RunnerCounters,
    telemetry: RunnerTelemetry,
    started_at: Instant,
}

impl<H: BatchHandler> Dispatcher<H> {
    pub fn new(
        handler: Arc<H>,
        config: RunnerConfig,
        runtime: Handle,
        rx: mpsc::Receiver<RunnerMessage<H::Item>>,
        self_tx: mpsc::Sender<RunnerMessage<H::Item>>,
        telemetry: RunnerTelemetry,
    ) -> Self {
        Self {
            handler,
            config,
            runtime,
            rx,
            self_tx,
            queue: BatchQueue::new(),
            staging: StagingBuffer::new(),
            pool: HashMap::new(),
            streamer: StreamerState::NotStarted,
            counters: RunnerCounters::default(),
            telemetry,
            started_at: Instant::now(),
        }
    }

    /// Serial message loop. Exits on shutdown.
    pub async fn run(mut self) {
        info!(runner = %self.config.name, "dispatcher started");
        self.telemetry.record(EVENT_RUNNER_STARTED, 0);

        let flush_interval = self.config.flush_interval;
        let flush = tokio::time::sleep(flush_interval);
        tokio::pin!(flush);

        loop {
            tokio::select! {
                maybe_msg = self.rx.recv() => {
                    // The dispatcher keeps a sender for spawned tasks, so the
                    // mailbox can only close through an explicit Shutdown.
                    let Some(msg) = maybe_msg else { break };
                    match msg {
                        RunnerMessage::Shutdown { reply } => {
                            self.shutdown(reply).await;
                            return;
                        }
                        other => self.handle(other),
                    }
                }
                () = &mut flush => {
                    self.flush();
                    flush.as_mut().reset(tokio::time::Instant::now() + flush_interval);
                }
            }
        }
    }

    fn handle(&mut self, msg: RunnerMessage<H::Item>) {
        match msg {
            RunnerMessage::Buffer { items, ack } => self.handle_buffer(items, ack),
            RunnerMessage::Enqueue { batches } => self.handle_enqueue(batches),
            RunnerMessage::StartStream => self.start_streamer(),
            RunnerMessage::HandlerDone { token, outcome } => self.handle_done(token, outcome),
            RunnerMessage::TaskExited { token, error } => self.handle_exited(token, error),
            RunnerMessage::Metrics { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RunnerMessage::Shutdown { .. } => unreachable!("handled by the run loop"),
        }
        self.dispatch();
    }

    fn handle_buffer(&mut self, items: Vec<H::Item>, ack: oneshot::Sender<()>) {
        if !items.is_empty() {
            let count = items.len();
            self.counters.items_buffered += count as u64;
            self.staging.push(items);
            self.telemetry.record(EVENT_STAGING_BUFFER_GROW, count as u64);
            debug!(
                runner = %self.config.name,
                count,
                staged = self.staging.item_count(),
                "items staged"
            );
        }
        let _ = ack.send(());
    }

    fn handle_enqueue(&mut self, batches: VecDeque<BatchRecord<H::Item>>) {
        let items: usize = batches.iter().map(BatchRecord::len).sum();
        self.counters.items_streamed += items as u64;
        debug!(
            runner = %self.config.name,
            batches = batches.len(),
            items,
            "streamer delivery spliced onto queue"
        );
        self.queue.append(batches);
    }

    fn handle_done(&mut self, token: Uuid, outcome: BatchOutcome<H::Item>) {
        let Some(record) = self.pool.remove(&token) else {
            warn!(%token, "outcome for unknown handler invocation");
            return;
        };

        match outcome {
            BatchOutcome::Ok => {
                self.counters.batches_succeeded += 1;
                debug!(%token, batch_size = record.len(), "batch succeeded");
            }
            BatchOutcome::Retry => {
                self.counters.batches_retried += 1;
                warn!(
                    %token,
                    batch_size = record.len(),
                    retries = record.retries,
                    "handler requested retry"
                );
                self.queue.push_back(record.retried());
            }
            BatchOutcome::RetryWith(items) if items.is_empty() => {
                // Empty batches are never enqueued; the batch is done.
                self.counters.batches_succeeded += 1;
                warn!(%token, "retry with empty replacement; dropping batch");
            }
            BatchOutcome::RetryWith(items) => {
                self.counters.batches_retried += 1;
                warn!(
                    %token,
                    replacement_size = items.len(),
                    retries = record.retries,
                    "handler requested retry with replacement items"
                );
                self.queue.push_back(BatchRecord::replaced(record.retries, items));
            }
        }
    }

    fn handle_exited(&mut self, token: Uuid, error: Option<String>) {
        let stream_token = match &self.streamer {
            StreamerState::Running { token, .. } => Some(*token),
            _ => None,
        };
        if stream_token == Some(token) {
            match &error {
                None => info!(runner = %self.config.name, "initial stream complete"),
                Some(reason) => error!(
                    runner = %self.config.name,
                    %reason,
                    "initial stream failed; undelivered items will not be \
                     re-enumerated until restart"
                ),
            }
            self.streamer = StreamerState::Complete;
            self.telemetry
                .record(EVENT_STREAM_COMPLETED, self.counters.items_streamed);
            return;
        }

        let Some(record) = self.pool.remove(&token) else {
            debug!(%token, "exit notice for unknown task");
            return;
        };

        // A crashed invocation is an implicit retry of its batch.
        self.counters.handler_crashes += 1;
        self.counters.batches_retried += 1;
        error!(
            %token,
            batch_size = record.len(),
            retries = record.retries,
            error = error.as_deref().unwrap_or("unknown"),
            "handler invocation crashed; requeueing batch"
        );
        self.queue.push_back(record.retried());
    }

    /// Move staged items into the batch queue in `max_batch_size` chunks,
    /// then dispatch. Runs on every flush-timer tick.
    fn flush(&mut self) {
        if !self.staging.is_empty() {
            let staged = self.staging.item_count();
            let chunks = self.staging.drain_chunks(self.config.max_batch_size);
            debug!(
                runner = %self.config.name,
                items = staged,
                batches = chunks.len(),
                "staging buffer flushed"
            );
            for items in chunks {
                self.queue.push_back(BatchRecord::new(items));
            }
            self.telemetry.record(EVENT_STAGING_BUFFER_RESET, 0);
        }
        self.dispatch();
    }

    /// While below the concurrency cap and the queue is non-empty, launch
    /// handler invocations. The sole mechanism for starting new work.
    fn dispatch(&mut self) {
        while self.pool.len() < self.config.max_concurrency {
            let Some(record) = self.queue.pop_front() else {
                break;
            };
            self.spawn_handler(record);
        }
    }

    fn spawn_handler(&mut self, record: BatchRecord<H::Item>) {
        let token = Uuid::new_v4();
        let handler = Arc::clone(&self.handler);
        let items = Arc::clone(&record.items);
        let retries = record.retries;

        self.counters.batches_dispatched += 1;
        debug!(
            %token,
            batch_size = items.len(),
            retries,
            in_flight = self.pool.len() + 1,
            "dispatching batch"
        );

        let invocation = self
            .runtime
            .spawn(async move { handler.run(items.as_slice(), retries).await });

        let tx = self.self_tx.clone();
        self.runtime.spawn(async move {
            let message = match invocation.await {
                Ok(outcome) => RunnerMessage::HandlerDone { token, outcome },
                Err(join_error) => RunnerMessage::TaskExited {
                    token,
                    error: Some(join_error.to_string()),
                },
            };
            let _ = tx.send(message).await;
        });

        self.pool.insert(token, record);
    }

    fn start_streamer(&mut self) {
        if !matches!(self.streamer, StreamerState::NotStarted) {
            return;
        }

        let token = Uuid::new_v4();
        let invocation = self.runtime.spawn(streamer::run_streamer(
            Arc::clone(&self.handler),
            self.self_tx.clone(),
            self.config.init_chunk_size,
            self.config.max_batch_size,
        ));
        let abort = invocation.abort_handle();

        let tx = self.self_tx.clone();
        self.runtime.spawn(async move {
            let error = match invocation.await {
                Ok(Ok(())) => None,
                Ok(Err(stream_error)) => Some(stream_error.to_string()),
                // Aborted by shutdown; the dispatcher is already draining.
                Err(join_error) if join_error.is_cancelled() => return,
                Err(join_error) => Some(join_error.to_string()),
            };
            let _ = tx.send(RunnerMessage::TaskExited { token, error }).await;
        });

        info!(runner = %self.config.name, "initial stream started");
        self.streamer = StreamerState::Running { token, abort };
    }

    async fn shutdown(mut self, reply: oneshot::Sender<()>) {
        info!(
            runner = %self.config.name,
            in_flight = self.pool.len(),
            queued = self.queue.len(),
            staged = self.staging.item_count(),
            "shutting down"
        );

        if let StreamerState::Running { abort, .. } = &self.streamer {
            abort.abort();
        }

        self.drain_in_flight().await;

        self.telemetry.record(EVENT_RUNNER_STOPPED, 0);
        info!(runner = %self.config.name, "dispatcher stopped");
        let _ = reply.send(());
    }

    /// Wait for in-flight handler invocations up to the shutdown deadline.
    /// New work is refused: buffers are dropped (their ack sender with
    /// them), outcomes are not requeued, and nothing new is dispatched.
    async fn drain_in_flight(&mut self) {
        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
        let mut extra_replies: Vec<oneshot::Sender<()>> = Vec::new();

        while !self.pool.is_empty() {
            let msg = tokio::select! {
                maybe_msg = self.rx.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    msg
                }
                () = tokio::time::sleep_until(deadline) => {
                    warn!(
                        runner = %self.config.name,
                        abandoned = self.pool.len(),
                        "shutdown deadline elapsed; abandoning in-flight handlers"
                    );
                    break;
                }
            };

            match msg {
                RunnerMessage::HandlerDone { token, .. }
                | RunnerMessage::TaskExited { token, .. } => {
                    self.pool.remove(&token);
                }
                RunnerMessage::Metrics { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                RunnerMessage::Shutdown { reply } => extra_replies.push(reply),
                RunnerMessage::Buffer { .. }
                | RunnerMessage::Enqueue { .. }
                | RunnerMessage::StartStream => {}
            }
        }

        for reply in extra_replies {
            let _ = reply.send(());
        }
    }

    fn snapshot(&self) -> RunnerMetrics {
        RunnerMetrics {
            name: self.config.name.clone(),
            buffer_gauge: self.staging.item_count()
                + self.queue.len() * self.config.max_batch_size,
            task_gauge: self.pool.len(),
            batch_queue_len: self.queue.len(),
            staged_items: self.staging.item_count(),
            batches_dispatched: self.counters.batches_dispatched,
            batches_succeeded: self.counters.batches_succeeded,
            batches_retried: self.counters.batches_retried,
            handler_crashes: self.counters.handler_crashes,
            items_streamed: self.counters.items_streamed,
            items_buffered: self.counters.items_buffered,
            stream_complete: matches!(self.streamer, StreamerState::Complete),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}
