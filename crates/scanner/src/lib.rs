#![warn(missing_docs)]
//! Chunk change-notification pipeline.
//!
//! Host callbacks (chunk load/unload, block changes, world teardown) are turned
//! into [`UpdateRequest`]s, pushed through a bounded FIFO queue and drained by a
//! single worker task. The worker fans each request out to the registered
//! [`BlockChangeSubscriber`]s; full-chunk scans run one task per Y layer.
//!
//! ```text
//! host events ──► ChunkScanner::on_* ──► UpdateQueue (bounded, FIFO)
//!                                              │
//!                                              ▼
//!                                         ScanWorker ──► backoff while no world
//!                                              │
//!                    ┌─────────────────────────┼──────────────────────┐
//!                    ▼                         ▼                      ▼
//!              ChunkUpdate               ChunkUnload             BlockUpdate
//!         chunk_update (joined)        clear_chunk (detached)   record_block (detached)
//!         record_block per layer
//!              (joined)
//! ```

mod config;
mod error;
mod fanout;
mod metrics;
mod queue;
mod request;
mod scanner;
mod subscriber;
mod worker;

pub use config::ScannerConfig;
pub use error::ScanError;
pub use metrics::{MetricsSnapshot, ScanMetrics};
pub use request::UpdateRequest;
pub use scanner::ChunkScanner;
pub use subscriber::{BlockChangeSubscriber, SubscriberHandle, SubscriberRegistry};
pub use worker::{backoff_delay, WorkerState};
