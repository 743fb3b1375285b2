//! Capabilities the host engine exposes to the scanner.

use std::sync::Arc;

use crate::{BlockPos, BlockState, ChunkPos};

/// Read access to one chunk column.
///
/// Implementations are shared across scan tasks and must be thread-safe.
pub trait ChunkAccess: Send + Sync {
    /// Column coordinate.
    fn position(&self) -> ChunkPos;

    /// True for placeholder chunks without block data.
    fn is_empty(&self) -> bool;

    /// Lowest block layer (inclusive).
    fn bottom_y(&self) -> i32;

    /// One past the highest block layer.
    fn top_y(&self) -> i32;

    /// Block state at an absolute position inside this chunk.
    fn block_state(&self, pos: BlockPos) -> BlockState;
}

/// Access to whatever world the host currently has loaded.
pub trait WorldAccess: Send + Sync {
    /// Whether a world is active. The scanner backs off while this is false.
    fn has_world(&self) -> bool;

    /// Chunk handle for `pos`, or `None` when no world is active.
    ///
    /// Unloaded coordinates yield an empty chunk rather than `None`.
    fn chunk(&self, pos: ChunkPos) -> Option<Arc<dyn ChunkAccess>>;
}
