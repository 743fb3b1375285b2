use thiserror::Error;

/// Failures surfaced by the chunk scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The subscriber is already in the registry.
    #[error("subscriber {name} already registered")]
    AlreadySubscribed {
        /// Subscriber name as reported by the subscriber.
        name: String,
    },

    /// The scanner has been shut down; no further requests are accepted.
    #[error("chunk scanner is shut down")]
    Closed,

    /// A subscriber callback panicked while a chunk was being scanned.
    #[error("subscriber {name} panicked during {stage}")]
    SubscriberPanicked {
        /// Subscriber name as reported by the subscriber.
        name: String,
        /// Callback that was running.
        stage: &'static str,
    },

    /// A fan-out task was aborted or could not be joined.
    #[error("scan task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
