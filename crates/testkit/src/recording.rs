use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use blockwatch_core::{BlockPos, BlockState, ChunkPos};
use blockwatch_scanner::BlockChangeSubscriber;

/// One callback received by a [`RecordingSubscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberEvent {
    /// `record_block` call.
    RecordBlock {
        /// Reported position.
        pos: BlockPos,
        /// Reported state.
        state: BlockState,
        /// Whether it came from a full scan.
        cleared: bool,
    },
    /// `chunk_update` call.
    ChunkUpdate(ChunkPos),
    /// `clear_chunk` call.
    ClearChunk(ChunkPos),
    /// `clear_all_chunks` call.
    ClearAll,
}

/// Subscriber that logs every callback in arrival order.
pub struct RecordingSubscriber {
    name: String,
    record_on_chunk_update: bool,
    events: Mutex<Vec<SubscriberEvent>>,
}

impl RecordingSubscriber {
    /// Subscriber that wants block callbacks during full scans.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            record_on_chunk_update: true,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Subscriber that only wants chunk announcements and single-block updates.
    pub fn opted_out(name: &str) -> Self {
        Self {
            record_on_chunk_update: false,
            ..Self::new(name)
        }
    }

    /// Copy of every event so far.
    pub fn events(&self) -> Vec<SubscriberEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Chunks announced via `chunk_update`, in order.
    pub fn chunk_updates(&self) -> Vec<ChunkPos> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SubscriberEvent::ChunkUpdate(pos) => Some(pos),
                _ => None,
            })
            .collect()
    }

    /// Chunks passed to `clear_chunk`, in order.
    pub fn cleared_chunks(&self) -> Vec<ChunkPos> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SubscriberEvent::ClearChunk(pos) => Some(pos),
                _ => None,
            })
            .collect()
    }

    /// `record_block` calls with the given `cleared` flag.
    pub fn recorded(&self, cleared: bool) -> Vec<(BlockPos, BlockState)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SubscriberEvent::RecordBlock {
                    pos,
                    state,
                    cleared: flag,
                } if flag == cleared => Some((pos, state)),
                _ => None,
            })
            .collect()
    }

    /// Distinct positions recorded with the given `cleared` flag.
    pub fn recorded_positions(&self, cleared: bool) -> HashSet<BlockPos> {
        self.recorded(cleared).into_iter().map(|(pos, _)| pos).collect()
    }

    /// Number of `clear_all_chunks` calls.
    pub fn clear_all_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SubscriberEvent::ClearAll))
            .count()
    }

    fn push(&self, event: SubscriberEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl BlockChangeSubscriber for RecordingSubscriber {
    fn should_call_record_block_on_chunk_update(&self) -> bool {
        self.record_on_chunk_update
    }

    fn record_block(&self, pos: BlockPos, state: BlockState, cleared: bool) {
        self.push(SubscriberEvent::RecordBlock {
            pos,
            state,
            cleared,
        });
    }

    fn chunk_update(&self, x: i32, z: i32) {
        self.push(SubscriberEvent::ChunkUpdate(ChunkPos::new(x, z)));
    }

    fn clear_chunk(&self, x: i32, z: i32) {
        self.push(SubscriberEvent::ClearChunk(ChunkPos::new(x, z)));
    }

    fn clear_all_chunks(&self) {
        self.push(SubscriberEvent::ClearAll);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Callback a [`PanickingSubscriber`] blows up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicOn {
    /// Panic in `chunk_update`.
    ChunkUpdate,
    /// Panic in `record_block`.
    RecordBlock,
}

/// Misbehaving subscriber used to check that the pipeline survives faults.
pub struct PanickingSubscriber {
    on: PanicOn,
}

impl PanickingSubscriber {
    /// Panic in the given callback.
    pub fn new(on: PanicOn) -> Self {
        Self { on }
    }
}

impl BlockChangeSubscriber for PanickingSubscriber {
    fn record_block(&self, pos: BlockPos, _state: BlockState, _cleared: bool) {
        if self.on == PanicOn::RecordBlock {
            panic!("record_block failed at {}", pos);
        }
    }

    fn chunk_update(&self, x: i32, z: i32) {
        if self.on == PanicOn::ChunkUpdate {
            panic!("chunk_update failed for ({}, {})", x, z);
        }
    }

    fn clear_chunk(&self, _x: i32, _z: i32) {}

    fn clear_all_chunks(&self) {}

    fn name(&self) -> &str {
        "panicking"
    }
}
