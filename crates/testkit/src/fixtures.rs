use std::sync::Arc;

use blockwatch_core::{BlockPos, BlockState, ChunkPos, CHUNK_SIZE_X, CHUNK_SIZE_Z};
use blockwatch_world::{Chunk, Host, World};

/// Block id the patterned fixture stores at a position.
pub fn pattern_id(pos: BlockPos) -> u16 {
    (pos.x + pos.y * 3 + pos.z * 7).rem_euclid(5) as u16 + 1
}

/// Chunk spanning y in [0, 256) where every block carries [`pattern_id`].
pub fn patterned_chunk(pos: ChunkPos) -> Chunk {
    let mut chunk = Chunk::new(pos);
    for y in 0..chunk.height() {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                let block = BlockPos::new(pos.start_x() + x, y, pos.start_z() + z);
                chunk.set_block(block, BlockState::of(pattern_id(block)));
            }
        }
    }
    chunk
}

/// Chunk with only `height` layers, all air, to keep scans cheap.
pub fn shallow_chunk(pos: ChunkPos, height: i32) -> Chunk {
    Chunk::with_extent(pos, 0, height)
}

/// World containing shallow chunks at `positions`.
pub fn shallow_world(positions: &[ChunkPos], height: i32) -> Arc<World> {
    let world = World::new();
    for &pos in positions {
        world.insert_chunk(shallow_chunk(pos, height));
    }
    Arc::new(world)
}

/// Host already inside `world`.
pub fn host_in(world: Arc<World>) -> Arc<Host> {
    Arc::new(Host::with_world(world))
}

/// `count` distinct chunk positions along the X axis.
pub fn row_of_chunks(count: i32) -> Vec<ChunkPos> {
    (0..count).map(|x| ChunkPos::new(x, 0)).collect()
}
