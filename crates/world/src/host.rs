use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{bail, Result};
use blockwatch_core::{BlockPos, BlockState, ChunkAccess, ChunkPos, WorldAccess};
use tracing::debug;

use crate::{Chunk, EmptyChunk};

/// Loaded chunk columns of one world.
///
/// Chunks are stored as `Arc` snapshots. Edits clone the chunk when a scan
/// still holds the previous snapshot, so readers never see a half-applied edit.
#[derive(Default)]
pub struct World {
    chunks: RwLock<BTreeMap<ChunkPos, Arc<Chunk>>>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a chunk. Returns true when the position was not loaded before.
    pub fn insert_chunk(&self, chunk: Chunk) -> bool {
        let pos = chunk.position();
        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        chunks.insert(pos, Arc::new(chunk)).is_none()
    }

    /// Drop a chunk from memory.
    pub fn remove_chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        chunks.remove(&pos)
    }

    /// Snapshot of a loaded chunk.
    pub fn get(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        chunks.get(&pos).cloned()
    }

    /// Handle for `pos`; unloaded positions yield an [`EmptyChunk`].
    pub fn chunk_handle(&self, pos: ChunkPos) -> Arc<dyn ChunkAccess> {
        match self.get(pos) {
            Some(chunk) => chunk as Arc<dyn ChunkAccess>,
            None => Arc::new(EmptyChunk::new(pos)),
        }
    }

    /// Block at an absolute position; air when the chunk is not loaded.
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.get(pos.chunk())
            .map(|chunk| chunk.block(pos))
            .unwrap_or(BlockState::AIR)
    }

    /// Replace a block, returning the previous state.
    pub fn set_block(&self, pos: BlockPos, state: BlockState) -> Result<BlockState> {
        let chunk_pos = pos.chunk();
        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        let Some(chunk) = chunks.get_mut(&chunk_pos) else {
            bail!("chunk {} is not loaded", chunk_pos);
        };
        match Arc::make_mut(chunk).set_block(pos, state) {
            Some(previous) => Ok(previous),
            None => bail!("block {} is outside the vertical range of chunk {}", pos, chunk_pos),
        }
    }

    /// Loaded chunk positions in deterministic order.
    pub fn loaded_positions(&self) -> Vec<ChunkPos> {
        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        chunks.keys().copied().collect()
    }

    /// Number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when no chunks are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Slot holding the world the host is currently in, if any.
#[derive(Default)]
pub struct Host {
    current: RwLock<Option<Arc<World>>>,
}

impl Host {
    /// Host with no active world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Host already inside `world`.
    pub fn with_world(world: Arc<World>) -> Self {
        Self {
            current: RwLock::new(Some(world)),
        }
    }

    /// Enter a world, returning the one that was active before.
    pub fn set_world(&self, world: Arc<World>) -> Option<Arc<World>> {
        debug!("Host entering world with {} chunks", world.len());
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(world)
    }

    /// Leave the current world.
    pub fn clear_world(&self) -> Option<Arc<World>> {
        debug!("Host leaving world");
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// The active world, if any.
    pub fn world(&self) -> Option<Arc<World>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WorldAccess for Host {
    fn has_world(&self) -> bool {
        self.world().is_some()
    }

    fn chunk(&self, pos: ChunkPos) -> Option<Arc<dyn ChunkAccess>> {
        self.world().map(|world| world.chunk_handle(pos))
    }
}
