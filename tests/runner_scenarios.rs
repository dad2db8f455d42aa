//! End-to-end batching scenarios: streaming, flushing, retries, crashes,
//! and the concurrency cap.

mod common;

use std::sync::Arc;
use std::time::Duration;

use batch_runner::BatchRunner;
use tokio::sync::Semaphore;

use common::{config, wait_until, Directive, ScriptedHandler};

#[tokio::test]
async fn streamed_items_are_batched_and_handled_once() {
    let handler = ScriptedHandler::new((1..=7).collect());
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 5)).unwrap();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 3).await);

    // First chunk delivery of five items yields [1,2,3] and [4,5]; the
    // residual yields [6,7]. No retries anywhere.
    let mut batches: Vec<(Vec<i64>, u32)> = handler.calls();
    batches.sort_by_key(|(batch, _)| batch[0]);
    assert_eq!(
        batches,
        vec![
            (vec![1, 2, 3], 0),
            (vec![4, 5], 0),
            (vec![6, 7], 0),
        ]
    );

    runner.shutdown().await.unwrap();
    assert_eq!(handler.call_count(), 3);
}

#[tokio::test]
async fn buffered_batch_is_retried_then_succeeds() {
    let handler = ScriptedHandler::scripted(vec![], vec![Directive::Retry]);
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 5)).unwrap();

    runner.buffer(vec![10, 11]).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 2).await);
    assert_eq!(
        handler.calls(),
        vec![(vec![10, 11], 0), (vec![10, 11], 1)]
    );

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn handler_supplied_retry_payload_replaces_batch() {
    let handler = ScriptedHandler::scripted(vec![], vec![Directive::RetryWith(vec![99])]);
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 5)).unwrap();

    runner.buffer(vec![10, 11]).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 2).await);
    assert_eq!(handler.calls(), vec![(vec![10, 11], 0), (vec![99], 1)]);

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn empty_retry_payload_drops_the_batch() {
    let handler = ScriptedHandler::scripted(vec![], vec![Directive::RetryWith(vec![])]);
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 5)).unwrap();

    runner.buffer(vec![10, 11]).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 1).await);
    // Several flush intervals later the batch has not come back.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.calls(), vec![(vec![10, 11], 0)]);

    let metrics = runner.metrics().await.unwrap();
    assert_eq!(metrics.batches_succeeded, 1);
    assert_eq!(metrics.batches_retried, 0);

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn retry_counts_are_monotonic() {
    let handler = ScriptedHandler::scripted(
        vec![],
        vec![Directive::Retry, Directive::Retry, Directive::Retry],
    );
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 5)).unwrap();

    runner.buffer(vec![5]).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 4).await);
    let retries: Vec<u32> = handler.calls().into_iter().map(|(_, r)| r).collect();
    assert_eq!(retries, vec![0, 1, 2, 3]);

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrency_never_exceeds_cap() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = ScriptedHandler::gated(vec![], Arc::clone(&gate));
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 1, 5)).unwrap();

    runner.buffer((0..20).collect()).await.unwrap();

    // Two invocations start and block on the gate; nothing else may launch.
    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 2).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.call_count(), 2);
    assert_eq!(handler.max_in_flight(), 2);

    let metrics = runner.metrics().await.unwrap();
    assert_eq!(metrics.task_gauge, 2);

    gate.add_permits(1000);
    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 20).await);
    assert_eq!(handler.max_in_flight(), 2);
    assert_eq!(handler.handled_items(), (0..20).collect::<Vec<i64>>());

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn crashed_handler_batch_is_requeued() {
    let handler = ScriptedHandler::scripted(vec![], vec![Directive::Panic]);
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 5)).unwrap();

    runner.buffer(vec![7, 8]).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 2).await);
    assert_eq!(handler.calls(), vec![(vec![7, 8], 0), (vec![7, 8], 1)]);

    let metrics = runner.metrics().await.unwrap();
    assert_eq!(metrics.handler_crashes, 1);
    assert_eq!(metrics.batches_retried, 1);

    runner.shutdown().await.unwrap();
}

#[tokio::test]
async fn interleaved_stream_and_buffer_lose_nothing() {
    let handler =
        ScriptedHandler::streaming_slowly((1..=10).collect(), Duration::from_millis(5));
    let runner = BatchRunner::start(handler.clone(), config(10, 2, 3, 3)).unwrap();

    runner.buffer(vec![100, 101]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(15)).await;
    runner.buffer(vec![100, 101]).await.unwrap();

    let mut expected: Vec<i64> = (1..=10).collect();
    expected.extend([100, 100, 101, 101]);
    expected.sort_unstable();

    assert!(
        wait_until(Duration::from_secs(3), || {
            handler.handled_items() == expected
        })
        .await
    );

    runner.shutdown().await.unwrap();
}
