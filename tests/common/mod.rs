//! Shared fixtures for runner integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batch_runner::{BatchHandler, BatchOutcome, ItemSink, Result, RunnerConfig};
use tokio::sync::Semaphore;

/// Per-invocation behavior popped by `run`; an exhausted script means `Ok`.
#[derive(Debug, Clone)]
pub enum Directive {
    Ok,
    Retry,
    RetryWith(Vec<i64>),
    Panic,
}

#[derive(Default)]
struct HandlerState {
    stream_items: Vec<i64>,
    stream_delay: Option<Duration>,
    script: Mutex<VecDeque<Directive>>,
    calls: Mutex<Vec<(Vec<i64>, u32)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

/// Test handler that streams a fixed item list, records every invocation,
/// and follows a per-call outcome script.
#[derive(Clone, Default)]
pub struct ScriptedHandler {
    inner: Arc<HandlerState>,
}

impl ScriptedHandler {
    pub fn new(stream_items: Vec<i64>) -> Self {
        Self {
            inner: Arc::new(HandlerState {
                stream_items,
                ..Default::default()
            }),
        }
    }

    pub fn scripted(stream_items: Vec<i64>, script: Vec<Directive>) -> Self {
        Self {
            inner: Arc::new(HandlerState {
                stream_items,
                script: Mutex::new(script.into()),
                ..Default::default()
            }),
        }
    }

    /// Handler that blocks inside `run` until the gate releases a permit.
    pub fn gated(stream_items: Vec<i64>, gate: Arc<Semaphore>) -> Self {
        Self {
            inner: Arc::new(HandlerState {
                stream_items,
                gate: Some(gate),
                ..Default::default()
            }),
        }
    }

    /// Handler whose stream sleeps between items.
    pub fn streaming_slowly(stream_items: Vec<i64>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(HandlerState {
                stream_items,
                stream_delay: Some(delay),
                ..Default::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<i64>, u32)> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// All items across all recorded invocations, sorted.
    pub fn handled_items(&self) -> Vec<i64> {
        let mut items: Vec<i64> = self
            .calls()
            .into_iter()
            .flat_map(|(batch, _)| batch)
            .collect();
        items.sort_unstable();
        items
    }
}

#[async_trait]
impl BatchHandler for ScriptedHandler {
    type Item = i64;

    async fn stream(&self, sink: ItemSink<i64>) -> Result<()> {
        for item in self.inner.stream_items.clone() {
            if let Some(delay) = self.inner.stream_delay {
                tokio::time::sleep(delay).await;
            }
            sink.send(item).await?;
        }
        Ok(())
    }

    async fn run(&self, batch: &[i64], retries: u32) -> BatchOutcome<i64> {
        let state = &self.inner;
        state.calls.lock().unwrap().push((batch.to_vec(), retries));

        let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &state.gate {
            gate.acquire().await.unwrap().forget();
        }

        let directive = state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Directive::Ok);

        state.in_flight.fetch_sub(1, Ordering::SeqCst);
        match directive {
            Directive::Ok => BatchOutcome::Ok,
            Directive::Retry => BatchOutcome::Retry,
            Directive::RetryWith(items) => BatchOutcome::RetryWith(items),
            Directive::Panic => panic!("scripted handler crash"),
        }
    }
}

/// Standard test configuration; flush interval in milliseconds.
pub fn config(
    flush_ms: u64,
    max_concurrency: usize,
    max_batch_size: usize,
    init_chunk_size: usize,
) -> RunnerConfig {
    RunnerConfig::builder()
        .flush_interval(Duration::from_millis(flush_ms))
        .max_concurrency(max_concurrency)
        .max_batch_size(max_batch_size)
        .init_chunk_size(init_chunk_size)
        .build()
        .unwrap()
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}
