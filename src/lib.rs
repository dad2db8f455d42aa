//! # batch-runner
//!
//! A buffered batch task runner: ingest an unbounded stream of opaque work
//! items, group them into bounded-size batches, execute the batches through a
//! user-supplied handler with capped concurrency, and retry batches that fail
//! or ask to be retried.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use batch_runner::{BatchHandler, BatchOutcome, BatchRunner, ItemSink, RunnerConfig};
//! use std::time::Duration;
//!
//! struct AccountBalanceFetcher;
//!
//! #[async_trait]
//! impl BatchHandler for AccountBalanceFetcher {
//!     type Item = u64;
//!
//!     async fn stream(&self, sink: ItemSink<u64>) -> batch_runner::Result<()> {
//!         // Enumerate pending items from the store.
//!         sink.send_all(0..1000).await
//!     }
//!
//!     async fn run(&self, batch: &[u64], retries: u32) -> BatchOutcome<u64> {
//!         // Fetch the batch from the remote endpoint; give up after a while.
//!         if retries > 5 {
//!             return BatchOutcome::Ok;
//!         }
//!         BatchOutcome::Ok
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> batch_runner::Result<()> {
//!     let config = RunnerConfig::builder()
//!         .flush_interval(Duration::from_millis(500))
//!         .max_concurrency(4)
//!         .max_batch_size(100)
//!         .init_chunk_size(1000)
//!         .name("balance-fetcher")
//!         .build()?;
//!
//!     let runner = BatchRunner::start(AccountBalanceFetcher, config)?;
//!     runner.buffer(vec![42]).await?;
//!     runner.shutdown().await
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod runner;

pub use config::{RunnerConfig, RunnerConfigBuilder};
pub use error::{BatchRunnerError, Result};
pub use events::{RunnerTelemetry, TelemetryEvent};
pub use runner::{BatchHandler, BatchOutcome, BatchRunner, ItemSink, RunnerMetrics};
