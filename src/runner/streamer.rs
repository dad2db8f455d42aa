//! Initial streamer task.
//!
//! Runs once per runner lifetime on its own task: drives the handler's
//! `stream` callback and regroups the emitted items into fixed-size
//! deliveries for the dispatcher. `init_chunk_size` sets the delivery
//! granularity toward the dispatcher; `max_batch_size` bounds the batches
//! inside each delivery.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;
use crate::runner::dispatcher::RunnerMessage;
use crate::runner::handler::{BatchHandler, ItemSink};
use crate::runner::queue::BatchRecord;

pub(crate) async fn run_streamer<H: BatchHandler>(
    handler: Arc<H>,
    tx: mpsc::Sender<RunnerMessage<H::Item>>,
    init_chunk_size: usize,
    max_batch_size: usize,
) -> Result<()> {
    let (item_tx, mut item_rx) = mpsc::channel(init_chunk_size);
    let producer = handler.stream(ItemSink::new(item_tx));

    let consumer = async {
        let mut pending: Vec<H::Item> = Vec::with_capacity(init_chunk_size);
        while let Some(item) = item_rx.recv().await {
            pending.push(item);
            if pending.len() >= init_chunk_size && !deliver(&tx, &mut pending, max_batch_size).await
            {
                return;
            }
        }
        // Residual group after the stream ends.
        if !pending.is_empty() {
            deliver(&tx, &mut pending, max_batch_size).await;
        }
    };

    // The producer owns the sink; when it finishes, the channel closes and
    // the consumer drains the residue.
    let (stream_result, ()) = tokio::join!(producer, consumer);
    stream_result
}

/// Slice the accumulated group into batch records and hand them to the
/// dispatcher. Returns false once the dispatcher has gone away.
async fn deliver<T>(
    tx: &mpsc::Sender<RunnerMessage<T>>,
    pending: &mut Vec<T>,
    max_batch_size: usize,
) -> bool {
    let group = std::mem::take(pending);
    let mut batches = VecDeque::with_capacity(group.len().div_ceil(max_batch_size));
    let mut items = group.into_iter();
    loop {
        let chunk: Vec<T> = items.by_ref().take(max_batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        batches.push_back(BatchRecord::new(chunk));
    }

    let delivered = batches.len();
    if tx.send(RunnerMessage::Enqueue { batches }).await.is_err() {
        debug!("dispatcher closed mid-stream; stopping enumeration");
        return false;
    }
    debug!(batches = delivered, "streamer delivery enqueued");
    true
}
