use blockwatch_core::{BlockPos, BlockState, ChunkAccess, ChunkPos, CHUNK_SIZE_X, CHUNK_SIZE_Z};

use crate::CHUNK_HEIGHT;

const LAYER_AREA: usize = (CHUNK_SIZE_X * CHUNK_SIZE_Z) as usize;

/// Chunk-local position (X, Y, Z) with Y relative to the chunk's bottom layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl LocalPos {
    /// Convert to a linear index into the block array.
    pub fn index(self) -> usize {
        debug_assert!(self.x < CHUNK_SIZE_X as usize);
        debug_assert!(self.z < CHUNK_SIZE_Z as usize);
        (self.y * CHUNK_SIZE_Z as usize + self.z) * CHUNK_SIZE_X as usize + self.x
    }
}

/// Chunk column storing one block state per position.
///
/// Cloning copies the block data; the world hands out `Arc` snapshots and
/// clones on write.
#[derive(Debug, Clone)]
pub struct Chunk {
    position: ChunkPos,
    bottom_y: i32,
    height: i32,
    blocks: Vec<BlockState>,
}

impl Chunk {
    /// Allocate a fresh chunk filled with air, spanning y in [0, 256).
    pub fn new(position: ChunkPos) -> Self {
        Self::with_extent(position, 0, CHUNK_HEIGHT)
    }

    /// Allocate an air-filled chunk spanning `[bottom_y, bottom_y + height)`.
    pub fn with_extent(position: ChunkPos, bottom_y: i32, height: i32) -> Self {
        let height = height.max(0);
        Self {
            position,
            bottom_y,
            height,
            blocks: vec![BlockState::AIR; height as usize * LAYER_AREA],
        }
    }

    #[inline]
    pub fn position(&self) -> ChunkPos {
        self.position
    }

    /// Number of block layers.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    fn local_index(&self, pos: BlockPos) -> Option<usize> {
        if pos.chunk() != self.position {
            return None;
        }
        let (x, y, z) = pos.local();
        let rel_y = y - self.bottom_y;
        if rel_y < 0 || rel_y >= self.height {
            return None;
        }
        Some(
            LocalPos {
                x,
                y: rel_y as usize,
                z,
            }
            .index(),
        )
    }

    /// Fetch the block at an absolute position; air outside the chunk.
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.local_index(pos)
            .map(|idx| self.blocks[idx])
            .unwrap_or(BlockState::AIR)
    }

    /// Set the block at an absolute position, returning the previous state.
    ///
    /// Positions outside the chunk are ignored and yield `None`.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Option<BlockState> {
        let idx = self.local_index(pos)?;
        Some(std::mem::replace(&mut self.blocks[idx], state))
    }

    /// Count of non-air blocks.
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|state| !state.is_air()).count()
    }
}

impl ChunkAccess for Chunk {
    fn position(&self) -> ChunkPos {
        self.position
    }

    fn is_empty(&self) -> bool {
        false
    }

    fn bottom_y(&self) -> i32 {
        self.bottom_y
    }

    fn top_y(&self) -> i32 {
        self.bottom_y + self.height
    }

    fn block_state(&self, pos: BlockPos) -> BlockState {
        self.block(pos)
    }
}

/// Placeholder returned for coordinates the world has not loaded.
#[derive(Debug, Clone, Copy)]
pub struct EmptyChunk {
    position: ChunkPos,
}

impl EmptyChunk {
    pub fn new(position: ChunkPos) -> Self {
        Self { position }
    }
}

impl ChunkAccess for EmptyChunk {
    fn position(&self) -> ChunkPos {
        self.position
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn bottom_y(&self) -> i32 {
        0
    }

    fn top_y(&self) -> i32 {
        CHUNK_HEIGHT
    }

    fn block_state(&self, _pos: BlockPos) -> BlockState {
        BlockState::AIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_STONE;

    #[test]
    fn test_local_pos_index() {
        let pos1 = LocalPos { x: 0, y: 0, z: 0 };
        assert_eq!(pos1.index(), 0);

        let pos2 = LocalPos { x: 15, y: 0, z: 0 };
        assert_eq!(pos2.index(), 15);

        let pos3 = LocalPos { x: 0, y: 1, z: 0 };
        assert_eq!(pos3.index(), LAYER_AREA);
    }

    #[test]
    fn set_and_get_block() {
        let mut chunk = Chunk::new(ChunkPos::new(1, -1));
        let pos = BlockPos::new(17, 40, -3);
        assert_eq!(
            chunk.set_block(pos, BlockState::of(BLOCK_STONE)),
            Some(BlockState::AIR)
        );
        assert_eq!(chunk.block(pos), BlockState::of(BLOCK_STONE));
        assert_eq!(chunk.solid_count(), 1);
    }

    #[test]
    fn out_of_chunk_positions_are_air_and_ignored() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0));
        let outside = BlockPos::new(16, 10, 0);
        assert_eq!(chunk.set_block(outside, BlockState::of(BLOCK_STONE)), None);
        assert!(chunk.block(outside).is_air());
        assert!(chunk.block(BlockPos::new(0, 256, 0)).is_air());
        assert!(chunk.block(BlockPos::new(0, -1, 0)).is_air());
    }

    #[test]
    fn custom_extent_reports_bounds() {
        let chunk = Chunk::with_extent(ChunkPos::new(0, 0), -64, 384);
        assert_eq!(chunk.bottom_y(), -64);
        assert_eq!(chunk.top_y(), 320);
        assert!(!ChunkAccess::is_empty(&chunk));
    }

    #[test]
    fn empty_chunk_is_empty() {
        let chunk = EmptyChunk::new(ChunkPos::new(3, 4));
        assert!(chunk.is_empty());
        assert_eq!(chunk.position(), ChunkPos::new(3, 4));
        assert!(chunk.block_state(BlockPos::new(48, 5, 64)).is_air());
    }
}
