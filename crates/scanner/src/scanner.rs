//! Host-facing entry point: event handlers, subscriptions and lifecycle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use blockwatch_core::{BlockPos, BlockState, ChunkPos, WorldAccess};
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::metrics::{MetricsSnapshot, ScanMetrics};
use crate::queue::UpdateQueue;
use crate::request::UpdateRequest;
use crate::subscriber::{SubscriberHandle, SubscriberRegistry};
use crate::worker::{ScanWorker, WorkerState};

/// State shared between the scanner handle, the worker and fan-out tasks.
pub(crate) struct Shared {
    pub(crate) config: ScannerConfig,
    pub(crate) host: Arc<dyn WorldAccess>,
    pub(crate) queue: UpdateQueue,
    pub(crate) registry: SubscriberRegistry,
    pub(crate) metrics: Arc<ScanMetrics>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tracker: TaskTracker,
    /// Slots for detached notifications, `channel_capacity` in total.
    pub(crate) detached: Arc<Semaphore>,
    /// Signalled whenever a detached notification finishes.
    pub(crate) progress: Notify,
}

impl Shared {
    fn detached_in_flight(&self) -> usize {
        self.config.channel_capacity - self.detached.available_permits()
    }
}

/// Chunk change-notification pipeline.
///
/// One instance per host process; construct it with [`ChunkScanner::start`]
/// and hand it to whatever forwards host events. Dropping it cancels the worker,
/// [`ChunkScanner::shutdown`] additionally waits for it.
pub struct ChunkScanner {
    shared: Arc<Shared>,
    loaded_chunks: Mutex<HashSet<ChunkPos>>,
    state: watch::Receiver<WorkerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChunkScanner {
    /// Spawn the worker and return the running scanner.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: ScannerConfig, host: Arc<dyn WorldAccess>) -> Self {
        let config = config.validated();
        let cancel = CancellationToken::new();
        let (queue, receiver) = UpdateQueue::new(config.channel_capacity, cancel.clone());
        let detached = Arc::new(Semaphore::new(config.channel_capacity));
        let shared = Arc::new(Shared {
            config,
            host,
            queue,
            registry: SubscriberRegistry::new(),
            metrics: Arc::new(ScanMetrics::default()),
            cancel,
            tracker: TaskTracker::new(),
            detached,
            progress: Notify::new(),
        });
        let (state_tx, state_rx) = watch::channel(WorkerState::Idle);
        let worker = ScanWorker::new(Arc::clone(&shared), receiver, state_tx);
        let handle = tokio::spawn(worker.run());
        info!(
            capacity = shared.config.channel_capacity,
            "Started chunk scanner"
        );
        Self {
            shared,
            loaded_chunks: Mutex::new(HashSet::new()),
            state: state_rx,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queue a request for the worker, waiting while the queue is full.
    pub async fn enqueue(&self, request: UpdateRequest) -> Result<(), ScanError> {
        self.shared.queue.enqueue(request).await?;
        self.shared.metrics.record_enqueued();
        Ok(())
    }

    /// Register a subscriber and queue a catch-up scan of every loaded chunk for it.
    ///
    /// If a catch-up request cannot be queued (the scanner is shutting down) the
    /// registration is rolled back and the error returned.
    pub async fn subscribe(&self, subscriber: SubscriberHandle) -> Result<(), ScanError> {
        self.shared.registry.insert(Arc::clone(&subscriber))?;

        if !self.shared.host.has_world() {
            return Ok(());
        }

        let loaded = self.loaded_chunks();
        debug!(
            "Scanning {} chunks for {}",
            loaded.len(),
            subscriber.name()
        );
        for pos in loaded {
            let Some(chunk) = self.shared.host.chunk(pos) else {
                break;
            };
            let queued = self
                .enqueue(UpdateRequest::ChunkUpdate {
                    chunk,
                    single_subscriber: Some(Arc::clone(&subscriber)),
                })
                .await;
            if let Err(err) = queued {
                self.shared.registry.remove(&subscriber);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Remove a subscriber and tell it to drop everything it tracked.
    ///
    /// Returns false if it was not registered; `clear_all_chunks` is called either way.
    pub fn unsubscribe(&self, subscriber: &SubscriberHandle) -> bool {
        let removed = self.shared.registry.remove(subscriber);
        subscriber.clear_all_chunks();
        removed
    }

    /// Host loaded a chunk.
    pub async fn on_chunk_load(&self, x: i32, z: i32) -> Result<(), ScanError> {
        let pos = ChunkPos::new(x, z);
        let Some(chunk) = self.shared.host.chunk(pos) else {
            warn!(chunk = %pos, "Chunk load without an active world");
            return Ok(());
        };
        self.enqueue(UpdateRequest::chunk_update(chunk)).await?;
        self.lock_loaded().insert(pos);
        Ok(())
    }

    /// Host replaced a chunk's contents (delta update packet).
    pub async fn on_chunk_delta_update(&self, x: i32, z: i32) -> Result<(), ScanError> {
        let pos = ChunkPos::new(x, z);
        let Some(chunk) = self.shared.host.chunk(pos) else {
            warn!(chunk = %pos, "Chunk delta update without an active world");
            return Ok(());
        };
        self.enqueue(UpdateRequest::chunk_update(chunk)).await
    }

    /// Host unloaded a chunk.
    pub async fn on_chunk_unload(&self, x: i32, z: i32) -> Result<(), ScanError> {
        self.enqueue(UpdateRequest::ChunkUnload { x, z }).await?;
        self.lock_loaded().remove(&ChunkPos::new(x, z));
        Ok(())
    }

    /// Host changed a single block.
    pub async fn on_block_change(&self, pos: BlockPos, state: BlockState) -> Result<(), ScanError> {
        self.enqueue(UpdateRequest::BlockUpdate { pos, state }).await
    }

    /// Host switched worlds.
    pub fn on_world_change(&self) {
        self.clear_all_chunks();
    }

    /// Host disconnected from its server.
    pub fn on_disconnect(&self) {
        self.clear_all_chunks();
    }

    fn clear_all_chunks(&self) {
        for subscriber in self.shared.registry.snapshot().iter() {
            subscriber.clear_all_chunks();
        }
        self.lock_loaded().clear();
    }

    fn lock_loaded(&self) -> std::sync::MutexGuard<'_, HashSet<ChunkPos>> {
        self.loaded_chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Chunks currently tracked as loaded, sorted.
    pub fn loaded_chunks(&self) -> Vec<ChunkPos> {
        let mut chunks: Vec<_> = self.lock_loaded().iter().copied().collect();
        chunks.sort();
        chunks
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Whether this exact subscriber instance is registered.
    pub fn is_subscribed(&self, subscriber: &SubscriberHandle) -> bool {
        self.shared.registry.contains(subscriber)
    }

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Requests buffered in the queue, if the queue is not busy.
    pub fn pending(&self) -> Option<usize> {
        self.shared.queue.pending()
    }

    /// Latest worker state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Receiver that observes worker state transitions.
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Wait until every request whose `enqueue` has returned has left the queue
    /// and no detached notification is still running.
    ///
    /// Wakes on worker state transitions and on finished notifications.
    pub async fn wait_until_idle(&self) {
        let mut state = self.state.clone();
        let mut worker_alive = true;
        loop {
            let progress = self.shared.progress.notified();
            tokio::pin!(progress);
            progress.as_mut().enable();

            let worker_idle = matches!(
                *state.borrow_and_update(),
                WorkerState::Idle | WorkerState::Stopped
            );
            let metrics = self.metrics();
            if worker_idle
                && metrics.settled() >= metrics.enqueued
                && self.shared.detached_in_flight() == 0
            {
                return;
            }

            tokio::select! {
                _ = &mut progress => {}
                changed = state.changed(), if worker_alive => worker_alive = changed.is_ok(),
            }
        }
    }

    /// Cancel the worker and all outstanding tasks, close the queue and wait
    /// for the worker to exit. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        self.shared.queue.close().await;

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if let Err(err) = handle.await {
                warn!(error = %err, "Chunk scanner worker ended abnormally");
            }
        }

        self.shared.tracker.close();
        self.shared.tracker.wait().await;
    }
}

impl Drop for ChunkScanner {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
