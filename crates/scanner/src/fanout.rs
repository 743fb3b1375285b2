//! Dispatch of a single request to its subscribers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use blockwatch_core::{BlockPos, ChunkAccess, CHUNK_SIZE_X, CHUNK_SIZE_Z};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::error::ScanError;
use crate::request::UpdateRequest;
use crate::scanner::Shared;
use crate::subscriber::{BlockChangeSubscriber, SubscriberHandle};

/// Route one request.
///
/// Chunk scans are awaited. Unload and single-block notifications are handed to
/// a detached task once a slot is free, and the call returns without waiting for
/// the subscribers.
pub(crate) async fn dispatch(shared: &Arc<Shared>, request: UpdateRequest) -> Result<(), ScanError> {
    trace!(?request, "dispatch");
    match request {
        UpdateRequest::ChunkUpdate {
            chunk,
            single_subscriber,
        } => scan_chunk(shared, chunk, single_subscriber).await,
        UpdateRequest::ChunkUnload { x, z } => {
            shared.metrics.record_unload_notification();
            notify_detached(shared, "clear_chunk", move |sub| sub.clear_chunk(x, z)).await
        }
        UpdateRequest::BlockUpdate { pos, state } => {
            shared.metrics.record_block_notification();
            notify_detached(shared, "record_block", move |sub| {
                sub.record_block(pos, state, false)
            })
            .await
        }
    }
}

/// Spawn `notify` for every subscriber on the tracker.
///
/// At most `channel_capacity` detached notifications are in flight; beyond that
/// the worker waits here, the queue fills up and producers suspend.
async fn notify_detached<F>(
    shared: &Arc<Shared>,
    stage: &'static str,
    notify: F,
) -> Result<(), ScanError>
where
    F: Fn(&dyn BlockChangeSubscriber) + Send + 'static,
{
    let subscribers = shared.registry.snapshot();
    if subscribers.is_empty() {
        return Ok(());
    }
    let permit = Arc::clone(&shared.detached)
        .acquire_owned()
        .await
        .map_err(|_| ScanError::Closed)?;
    let task_shared = Arc::clone(shared);
    shared.tracker.spawn(async move {
        for sub in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| notify(sub.as_ref()))).is_err() {
                task_shared.metrics.record_dispatch_error();
                warn!(subscriber = sub.name(), stage, "Subscriber panicked");
            }
        }
        drop(permit);
        task_shared.progress.notify_waiters();
    });
    Ok(())
}

/// Full scan of one chunk: announce it, then record every block layer by layer.
async fn scan_chunk(
    shared: &Arc<Shared>,
    chunk: Arc<dyn ChunkAccess>,
    single_subscriber: Option<SubscriberHandle>,
) -> Result<(), ScanError> {
    let pos = chunk.position();
    if chunk.is_empty() {
        shared.metrics.record_empty_chunk();
        trace!(chunk = %pos, "Skipping empty chunk");
        return Ok(());
    }

    let targets = match single_subscriber {
        Some(sub) => Arc::new(vec![sub]),
        None => shared.registry.snapshot(),
    };

    let mut announcements = JoinSet::new();
    for (index, sub) in targets.iter().cloned().enumerate() {
        announcements.spawn(async move {
            let announced = catch_unwind(AssertUnwindSafe(|| sub.chunk_update(pos.x, pos.z)));
            (index, announced.is_ok())
        });
    }

    // A subscriber whose announcement panicked is left out of the layer pass;
    // everyone else still gets their blocks.
    let mut panicked = vec![false; targets.len()];
    let mut first_error = None;
    while let Some(joined) = announcements.join_next().await {
        match joined {
            Ok((_, true)) => {}
            Ok((index, false)) => {
                panicked[index] = true;
                let name = targets[index].name().to_string();
                warn!(subscriber = %name, chunk = %pos, "Subscriber panicked in chunk_update");
                first_error.get_or_insert(ScanError::SubscriberPanicked {
                    name,
                    stage: "chunk_update",
                });
            }
            Err(join_error) => {
                first_error.get_or_insert(ScanError::TaskFailed(join_error));
            }
        }
    }

    let recorders: Arc<[SubscriberHandle]> = targets
        .iter()
        .zip(&panicked)
        .filter(|(sub, panicked)| !**panicked && sub.should_call_record_block_on_chunk_update())
        .map(|(sub, _)| Arc::clone(sub))
        .collect();
    if recorders.is_empty() {
        shared.metrics.record_chunk_scanned();
        return first_error.map_or(Ok(()), Err);
    }

    let start = Instant::now();
    let mut layers = JoinSet::new();
    for y in chunk.bottom_y()..chunk.top_y() {
        let chunk = Arc::clone(&chunk);
        let recorders = Arc::clone(&recorders);
        layers.spawn(async move { scan_layer(chunk.as_ref(), &recorders, y) });
    }
    let (calls, layer_error) = join_layers(layers).await;

    shared.metrics.record_chunk_scanned();
    shared.metrics.record_block_callbacks(calls);
    debug!(
        "Scanning chunk {} took {}us",
        pos,
        start.elapsed().as_micros()
    );
    first_error.or(layer_error).map_or(Ok(()), Err)
}

/// Record all 16x16 positions of layer `y`.
///
/// A recorder that panics is skipped for the rest of the layer. Returns the
/// number of callbacks made and the name of the first recorder that panicked.
fn scan_layer(
    chunk: &dyn ChunkAccess,
    recorders: &[SubscriberHandle],
    y: i32,
) -> (u64, Option<String>) {
    let origin = chunk.position();
    let mut calls = 0;
    let mut skipped = vec![false; recorders.len()];
    let mut first_panic = None;
    for x in 0..CHUNK_SIZE_X {
        for z in 0..CHUNK_SIZE_Z {
            let pos = BlockPos::new(origin.start_x() + x, y, origin.start_z() + z);
            let state = chunk.block_state(pos);
            for (sub, skip) in recorders.iter().zip(skipped.iter_mut()) {
                if *skip {
                    continue;
                }
                if catch_unwind(AssertUnwindSafe(|| sub.record_block(pos, state, true))).is_err() {
                    *skip = true;
                    first_panic.get_or_insert_with(|| sub.name().to_string());
                    continue;
                }
                calls += 1;
            }
        }
    }
    (calls, first_panic)
}

/// Wait for every layer task, summing callbacks. The first failure is reported
/// after all layers have finished.
async fn join_layers(mut set: JoinSet<(u64, Option<String>)>) -> (u64, Option<ScanError>) {
    let mut total = 0;
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((calls, panicked)) => {
                total += calls;
                if let Some(name) = panicked {
                    warn!(subscriber = %name, "Subscriber panicked in record_block");
                    first_error.get_or_insert(ScanError::SubscriberPanicked {
                        name,
                        stage: "record_block",
                    });
                }
            }
            Err(join_error) => {
                first_error.get_or_insert(ScanError::TaskFailed(join_error));
            }
        }
    }
    (total, first_error)
}
