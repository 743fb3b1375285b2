//! The single sequential consumer of the update queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::fanout::dispatch;
use crate::request::UpdateRequest;
use crate::scanner::Shared;

/// Observable state of the scan worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next request.
    Idle,
    /// Handling a request.
    Dispatching,
    /// No world was active; waiting before taking the next request.
    Backoff {
        /// Consecutive unavailable cycles so far, starting at 1.
        attempt: u32,
        /// Length of this wait.
        delay: Duration,
    },
    /// Shut down; terminal.
    Stopped,
}

/// Delay before retry number `retrying` (0-based): `base * 2^retrying`, capped at `max`.
pub fn backoff_delay(retrying: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(retrying).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

pub(crate) struct ScanWorker {
    shared: Arc<Shared>,
    receiver: mpsc::Receiver<UpdateRequest>,
    state: watch::Sender<WorkerState>,
    retrying: u32,
}

impl ScanWorker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        receiver: mpsc::Receiver<UpdateRequest>,
        state: watch::Sender<WorkerState>,
    ) -> Self {
        Self {
            shared,
            receiver,
            state,
            retrying: 0,
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    pub(crate) async fn run(mut self) {
        info!("Chunk scanner worker started");
        let cancel = self.shared.cancel.clone();
        loop {
            self.set_state(WorkerState::Idle);
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = self.receiver.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            if !self.shared.host.has_world() {
                drop(request);
                self.shared.metrics.record_discarded(1);
                if !self.reset_queue().await {
                    break;
                }
                let delay = backoff_delay(
                    self.retrying,
                    self.shared.config.backoff_base(),
                    self.shared.config.backoff_max(),
                );
                self.retrying = self.retrying.saturating_add(1);
                self.set_state(WorkerState::Backoff {
                    attempt: self.retrying,
                    delay,
                });
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }

            self.retrying = 0;
            self.set_state(WorkerState::Dispatching);
            let kind = request.kind();
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = dispatch(&self.shared, request) => result,
            };
            self.shared.metrics.record_dispatched();
            if let Err(err) = result {
                self.retrying = self.retrying.saturating_add(1);
                self.shared.metrics.record_dispatch_error();
                warn!(kind, error = %err, "Chunk update error");
            }
        }
        self.set_state(WorkerState::Stopped);
        info!("Stopped chunk scanner worker");
    }

    /// Swap in an empty queue so nothing queued against the old world survives.
    /// Returns false if the queue has been closed.
    async fn reset_queue(&mut self) -> bool {
        let (fresh, discarded) = self.shared.queue.reset(&mut self.receiver).await;
        self.shared.metrics.record_discarded(discarded);
        self.shared.metrics.record_queue_reset();
        match fresh {
            Some(receiver) => {
                if discarded > 0 {
                    warn!(discarded, "No world loaded; dropped stale chunk updates");
                }
                self.receiver = receiver;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);
    const CAP: Duration = Duration::from_secs(30);

    #[test]
    fn backoff_doubles_then_caps() {
        let delays: Vec<u64> = (0..8)
            .map(|retry| backoff_delay(retry, SECOND, CAP).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn backoff_saturates_for_large_retry_counts() {
        assert_eq!(backoff_delay(31, SECOND, CAP), CAP);
        assert_eq!(backoff_delay(64, SECOND, CAP), CAP);
        assert_eq!(backoff_delay(u32::MAX, SECOND, CAP), CAP);
    }

    #[test]
    fn cumulative_backoff_matches_closed_form() {
        for k in 0..12u32 {
            let total: Duration = (0..k).map(|i| backoff_delay(i, SECOND, CAP)).sum();
            let expected: u64 = (0..k).map(|i| 2u64.pow(i).min(30)).sum();
            assert_eq!(total.as_secs(), expected, "k = {}", k);
        }
    }
}
