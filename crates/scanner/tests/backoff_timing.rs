//! Worker behaviour while no world is active, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use blockwatch_core::{BlockPos, BlockState, WorldAccess};
use blockwatch_scanner::{backoff_delay, ChunkScanner, ScannerConfig, UpdateRequest, WorkerState};
use blockwatch_testkit::{row_of_chunks, shallow_world, RecordingSubscriber};
use blockwatch_world::Host;
use tokio::sync::watch;
use tokio::time::Instant;

fn block_request() -> UpdateRequest {
    UpdateRequest::BlockUpdate {
        pos: BlockPos::new(0, 64, 0),
        state: BlockState::of(1),
    }
}

async fn wait_for_attempt(state: &mut watch::Receiver<WorkerState>, attempt: u32) -> Duration {
    let observed = *state
        .wait_for(|s| matches!(s, WorkerState::Backoff { attempt: a, .. } if *a == attempt))
        .await
        .expect("worker stopped");
    match observed {
        WorkerState::Backoff { delay, .. } => delay,
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn retries_wait_doubling_delays_up_to_the_cap() {
    let host = Arc::new(Host::new());
    let scanner = ChunkScanner::start(ScannerConfig::default(), Arc::clone(&host) as Arc<dyn WorldAccess>);
    let mut state = scanner.watch_state();
    let base = Duration::from_secs(1);
    let cap = Duration::from_secs(30);

    scanner.enqueue(block_request()).await.unwrap();
    let first = wait_for_attempt(&mut state, 1).await;
    assert_eq!(first, base);
    let origin = Instant::now();

    for attempt in 2..=9u32 {
        scanner.enqueue(block_request()).await.unwrap();
        let delay = wait_for_attempt(&mut state, attempt).await;
        assert_eq!(delay, backoff_delay(attempt - 1, base, cap));
        assert!(delay <= cap);

        // Total time waited before this retry is the sum of all earlier steps.
        let waited: Duration = (0..attempt - 1).map(|i| backoff_delay(i, base, cap)).sum();
        assert_eq!(origin.elapsed(), waited, "attempt {}", attempt);
    }

    let metrics = scanner.metrics();
    assert_eq!(metrics.discarded, 9);
    assert_eq!(metrics.dispatched, 0);
    assert_eq!(metrics.queue_resets, 9);
    scanner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retry_counter_resets_once_a_world_is_back() {
    let host = Arc::new(Host::new());
    let scanner = ChunkScanner::start(ScannerConfig::default(), Arc::clone(&host) as Arc<dyn WorldAccess>);
    let mut state = scanner.watch_state();

    for attempt in 1..=3 {
        scanner.enqueue(block_request()).await.unwrap();
        wait_for_attempt(&mut state, attempt).await;
    }

    let positions = row_of_chunks(1);
    host.set_world(shallow_world(&positions, 1));
    scanner.on_chunk_load(0, 0).await.unwrap();
    scanner.wait_until_idle().await;
    assert_eq!(scanner.metrics().dispatched, 1);

    host.clear_world();
    scanner.enqueue(block_request()).await.unwrap();
    let delay = wait_for_attempt(&mut state, 1).await;
    assert_eq!(delay, Duration::from_secs(1));
    scanner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn requests_queued_against_a_missing_world_are_dropped() {
    let host = Arc::new(Host::new());
    let scanner = ChunkScanner::start(ScannerConfig::default(), Arc::clone(&host) as Arc<dyn WorldAccess>);
    let mut state = scanner.watch_state();
    let sub = Arc::new(RecordingSubscriber::opted_out("stale"));
    scanner.subscribe(sub.clone()).await.unwrap();

    scanner.enqueue(block_request()).await.unwrap();
    wait_for_attempt(&mut state, 1).await;

    // Queued during the wait; the next cycle still finds no world and purges them.
    for x in 0..3 {
        scanner
            .enqueue(UpdateRequest::ChunkUnload { x, z: 0 })
            .await
            .unwrap();
    }
    wait_for_attempt(&mut state, 2).await;

    let metrics = scanner.metrics();
    assert_eq!(metrics.discarded, 4);
    assert_eq!(metrics.settled(), metrics.enqueued);
    assert!(sub.events().is_empty());
    assert_eq!(scanner.pending(), Some(0));
    scanner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_backoff() {
    let host = Arc::new(Host::new());
    let config = ScannerConfig {
        backoff_base_ms: 60_000,
        backoff_max_ms: 600_000,
        ..ScannerConfig::default()
    };
    let scanner = ChunkScanner::start(config, Arc::clone(&host) as Arc<dyn WorldAccess>);
    let mut state = scanner.watch_state();

    scanner.enqueue(block_request()).await.unwrap();
    wait_for_attempt(&mut state, 1).await;

    let before = Instant::now();
    scanner.shutdown().await;
    assert!(before.elapsed() < Duration::from_secs(60));
    assert_eq!(scanner.state(), WorkerState::Stopped);
}
