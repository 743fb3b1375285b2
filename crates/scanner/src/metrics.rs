//! Pipeline counters for monitoring and debugging.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by producers, the worker and fan-out tasks.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    enqueued: AtomicU64,
    dispatched: AtomicU64,
    discarded: AtomicU64,
    chunks_scanned: AtomicU64,
    empty_chunks_skipped: AtomicU64,
    block_callbacks: AtomicU64,
    unload_notifications: AtomicU64,
    block_notifications: AtomicU64,
    dispatch_errors: AtomicU64,
    queue_resets: AtomicU64,
}

/// Point-in-time copy of [`ScanMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Requests accepted by the queue.
    pub enqueued: u64,
    /// Requests the worker dispatched (successfully or not).
    pub dispatched: u64,
    /// Requests dropped because no world was active.
    pub discarded: u64,
    /// Non-empty chunks that went through a full scan.
    pub chunks_scanned: u64,
    /// Chunks skipped because they reported no data.
    pub empty_chunks_skipped: u64,
    /// `record_block` calls issued during full scans.
    pub block_callbacks: u64,
    /// Unload requests fanned out.
    pub unload_notifications: u64,
    /// Single-block requests fanned out.
    pub block_notifications: u64,
    /// Dispatch failures (panicking subscribers, failed tasks).
    pub dispatch_errors: u64,
    /// Times the queue was replaced after the world went away.
    pub queue_resets: u64,
}

impl MetricsSnapshot {
    /// Requests that have left the queue one way or another.
    pub fn settled(&self) -> u64 {
        self.dispatched + self.discarded
    }
}

impl ScanMetrics {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_chunk_scanned(&self) {
        self.chunks_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_chunk(&self) {
        self.empty_chunks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_block_callbacks(&self, count: u64) {
        self.block_callbacks.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_unload_notification(&self) {
        self.unload_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_block_notification(&self) {
        self.block_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_error(&self) {
        self.dispatch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_reset(&self) {
        self.queue_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            chunks_scanned: self.chunks_scanned.load(Ordering::Relaxed),
            empty_chunks_skipped: self.empty_chunks_skipped.load(Ordering::Relaxed),
            block_callbacks: self.block_callbacks.load(Ordering::Relaxed),
            unload_notifications: self.unload_notifications.load(Ordering::Relaxed),
            block_notifications: self.block_notifications.load(Ordering::Relaxed),
            dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
            queue_resets: self.queue_resets.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = ScanMetrics::default();
        metrics.record_enqueued();
        metrics.record_enqueued();
        metrics.record_dispatched();
        metrics.record_discarded(3);
        metrics.record_block_callbacks(256);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.settled(), 4);
        assert_eq!(snapshot.block_callbacks, 256);
        assert_eq!(snapshot.dispatch_errors, 0);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_string(&MetricsSnapshot::default()).unwrap();
        assert!(json.contains("\"queue_resets\":0"));
    }
}
