//! # Handler Capability
//!
//! A [`BatchHandler`] supplies the two operations the runner needs from its
//! collaborator: a one-shot enumeration of pre-existing pending items
//! (`stream`) and the per-batch work function (`run`). The implementing value
//! carries whatever state the handler needs; the runner shares it with every
//! invocation and treats it as opaque.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{BatchRunnerError, Result};

/// Outcome of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome<T> {
    /// The batch is done; discard it.
    Ok,
    /// Re-enqueue the same batch with an incremented retry count.
    Retry,
    /// Re-enqueue replacement items with an incremented retry count.
    RetryWith(Vec<T>),
}

/// Destination for items produced by [`BatchHandler::stream`].
#[derive(Debug)]
pub struct ItemSink<T> {
    tx: mpsc::Sender<T>,
}

impl<T> ItemSink<T> {
    pub(crate) fn new(tx: mpsc::Sender<T>) -> Self {
        Self { tx }
    }

    /// Push one item into the runner.
    ///
    /// Fails once the runner stops consuming (shutdown mid-stream).
    pub async fn send(&self, item: T) -> Result<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| BatchRunnerError::Streamer("runner stopped consuming items".to_string()))
    }

    /// Push a sequence of items into the runner.
    pub async fn send_all(&self, items: impl IntoIterator<Item = T> + Send) -> Result<()> {
        for item in items {
            self.send(item).await?;
        }
        Ok(())
    }
}

/// The work collaborator: a streamer and a per-batch work function.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    /// Opaque work item. The runner never inspects its contents.
    type Item: Send + Sync + 'static;

    /// Enumerate pre-existing pending items into the sink.
    ///
    /// Called exactly once per runner lifetime, on its own task. An `Err`
    /// return is logged and the enumeration is not retried until the runner
    /// is restarted; items already delivered stay queued.
    async fn stream(&self, sink: ItemSink<Self::Item>) -> Result<()>;

    /// Execute one batch.
    ///
    /// `retries` counts prior attempts of this batch, starting at zero and
    /// unbounded; a handler that wants to give up on a poisoned batch
    /// consults it and returns [`BatchOutcome::Ok`].
    async fn run(&self, batch: &[Self::Item], retries: u32) -> BatchOutcome<Self::Item>;
}
