use std::fmt;
use std::sync::Arc;

use blockwatch_core::{BlockPos, BlockState, ChunkAccess};

use crate::subscriber::SubscriberHandle;

/// Work item travelling through the update queue.
pub enum UpdateRequest {
    /// Scan a whole chunk, for every subscriber or just one (catch-up scan).
    ChunkUpdate {
        /// Chunk to scan.
        chunk: Arc<dyn ChunkAccess>,
        /// Restrict the scan to this subscriber.
        single_subscriber: Option<SubscriberHandle>,
    },
    /// A chunk left the world.
    ChunkUnload {
        /// Chunk column X.
        x: i32,
        /// Chunk column Z.
        z: i32,
    },
    /// A single block changed.
    BlockUpdate {
        /// Changed position.
        pos: BlockPos,
        /// New state at `pos`.
        state: BlockState,
    },
}

impl UpdateRequest {
    /// Full scan of `chunk` for all subscribers.
    pub fn chunk_update(chunk: Arc<dyn ChunkAccess>) -> Self {
        Self::ChunkUpdate {
            chunk,
            single_subscriber: None,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChunkUpdate { .. } => "chunk_update",
            Self::ChunkUnload { .. } => "chunk_unload",
            Self::BlockUpdate { .. } => "block_update",
        }
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkUpdate {
                chunk,
                single_subscriber,
            } => f
                .debug_struct("ChunkUpdate")
                .field("chunk", &chunk.position())
                .field(
                    "single_subscriber",
                    &single_subscriber.as_ref().map(|sub| sub.name()),
                )
                .finish(),
            Self::ChunkUnload { x, z } => f
                .debug_struct("ChunkUnload")
                .field("x", x)
                .field("z", z)
                .finish(),
            Self::BlockUpdate { pos, state } => f
                .debug_struct("BlockUpdate")
                .field("pos", pos)
                .field("state", state)
                .finish(),
        }
    }
}
