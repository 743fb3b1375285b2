//! Bounded FIFO between host callbacks and the scan worker.

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ScanError;
use crate::request::UpdateRequest;

/// Sender side of the update channel.
///
/// The current sender sits behind one async mutex: `enqueue` holds it for
/// "read the current channel, send to it", and `reset` takes the same guard
/// to swap in a fresh channel. `None` once closed.
pub(crate) struct UpdateQueue {
    sender: Mutex<Option<mpsc::Sender<UpdateRequest>>>,
    capacity: usize,
    cancel: CancellationToken,
}

impl UpdateQueue {
    pub(crate) fn new(
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<UpdateRequest>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            sender: Mutex::new(Some(tx)),
            capacity,
            cancel,
        };
        (queue, rx)
    }

    /// Push a request, waiting while the queue is full.
    ///
    /// Fails with [`ScanError::Closed`] once the pipeline is shutting down,
    /// including when the caller is parked on a full queue.
    pub(crate) async fn enqueue(&self, request: UpdateRequest) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::Closed);
        }
        let guard = tokio::select! {
            guard = self.sender.lock() => guard,
            _ = self.cancel.cancelled() => return Err(ScanError::Closed),
        };
        let Some(sender) = guard.as_ref() else {
            return Err(ScanError::Closed);
        };
        trace!(kind = request.kind(), "enqueue");
        tokio::select! {
            result = sender.send(request) => result.map_err(|_| ScanError::Closed),
            _ = self.cancel.cancelled() => Err(ScanError::Closed),
        }
    }

    /// Replace the channel with an empty one, dropping everything `stale` still holds.
    ///
    /// While waiting for the sender guard the stale receiver keeps being drained,
    /// so a producer parked on a full queue can finish and release the guard.
    /// Returns the new receiver (or `None` if the queue was closed) and the
    /// number of discarded requests.
    pub(crate) async fn reset(
        &self,
        stale: &mut mpsc::Receiver<UpdateRequest>,
    ) -> (Option<mpsc::Receiver<UpdateRequest>>, u64) {
        let mut discarded = 0u64;
        let mut drained = false;
        let lock = self.sender.lock();
        tokio::pin!(lock);
        let mut guard = loop {
            tokio::select! {
                biased;
                guard = &mut lock => break guard,
                request = stale.recv(), if !drained => match request {
                    Some(_) => discarded += 1,
                    None => drained = true,
                },
            }
        };

        stale.close();
        while stale.try_recv().is_ok() {
            discarded += 1;
        }

        let Some(sender) = guard.as_mut() else {
            return (None, discarded);
        };
        let (tx, rx) = mpsc::channel(self.capacity);
        *sender = tx;
        (Some(rx), discarded)
    }

    /// Stop accepting requests. Parked producers are released by the cancellation token.
    pub(crate) async fn close(&self) {
        self.sender.lock().await.take();
    }

    /// Buffered request count, or `None` while a producer holds the guard.
    pub(crate) fn pending(&self) -> Option<usize> {
        let guard = self.sender.try_lock().ok()?;
        let sender = guard.as_ref()?;
        Some(sender.max_capacity() - sender.capacity())
    }
}
