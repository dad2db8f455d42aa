//! Batch queue and staging buffer.
//!
//! Both structures are plain single-owner state; only the dispatcher touches
//! them, so no interior locking is needed.

use std::collections::VecDeque;
use std::sync::Arc;

/// One queued unit of work: a non-empty batch plus its retry count.
///
/// Items are shared behind an `Arc` so an in-flight record can be requeued
/// after a handler crash without cloning the items themselves.
#[derive(Debug, Clone)]
pub(crate) struct BatchRecord<T> {
    pub items: Arc<Vec<T>>,
    pub retries: u32,
}

impl<T> BatchRecord<T> {
    pub fn new(items: Vec<T>) -> Self {
        debug_assert!(!items.is_empty());
        Self {
            items: Arc::new(items),
            retries: 0,
        }
    }

    /// The same batch, one attempt later.
    pub fn retried(self) -> Self {
        Self {
            items: self.items,
            retries: self.retries + 1,
        }
    }

    /// A replacement batch supplied by the handler, one attempt later.
    pub fn replaced(retries: u32, items: Vec<T>) -> Self {
        debug_assert!(!items.is_empty());
        Self {
            items: Arc::new(items),
            retries: retries + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// FIFO of batch records awaiting dispatch.
///
/// Two enqueue paths append here: whole sub-queues delivered by the initial
/// streamer, and single records from flush or retry. Takes occur at the head.
#[derive(Debug)]
pub(crate) struct BatchQueue<T> {
    records: VecDeque<BatchRecord<T>>,
}

impl<T> BatchQueue<T> {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, record: BatchRecord<T>) {
        self.records.push_back(record);
    }

    /// Splice a streamer-built sub-queue onto the tail.
    pub fn append(&mut self, mut batches: VecDeque<BatchRecord<T>>) {
        self.records.append(&mut batches);
    }

    pub fn pop_front(&mut self) -> Option<BatchRecord<T>> {
        self.records.pop_front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Unordered accumulator for items submitted ad-hoc between flushes.
///
/// Each `buffer` call appends one list in constant time; flattening and
/// chunking cost is paid at flush, not on the producer's call path.
#[derive(Debug)]
pub(crate) struct StagingBuffer<T> {
    lists: Vec<Vec<T>>,
    item_count: usize,
}

impl<T> StagingBuffer<T> {
    pub fn new() -> Self {
        Self {
            lists: Vec::new(),
            item_count: 0,
        }
    }

    pub fn push(&mut self, items: Vec<T>) {
        self.item_count += items.len();
        self.lists.push(items);
    }

    /// Number of staged items.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Drain everything staged into contiguous chunks of at most
    /// `max_batch_size` items, preserving submission order within the drain.
    pub fn drain_chunks(&mut self, max_batch_size: usize) -> Vec<Vec<T>> {
        let mut chunks = Vec::with_capacity(self.item_count.div_ceil(max_batch_size));
        let mut current = Vec::with_capacity(max_batch_size.min(self.item_count));

        for item in self.lists.drain(..).flatten() {
            current.push(item);
            if current.len() == max_batch_size {
                chunks.push(std::mem::replace(
                    &mut current,
                    Vec::with_capacity(max_batch_size),
                ));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        self.item_count = 0;
        chunks
    }
}
