//! Deterministic terrain used to populate the in-memory host world.
//!
//! Columns are layered bedrock / stone / dirt / grass with a gently varying
//! surface height, then stone is seeded with ores per chunk.

use blockwatch_core::{scoped_rng, BlockPos, BlockState, ChunkPos, CHUNK_SIZE_X, CHUNK_SIZE_Z};
use rand::Rng;
use tracing::{debug, instrument};

use crate::{
    Chunk, World, BLOCK_BEDROCK, BLOCK_COAL_ORE, BLOCK_DIAMOND_ORE, BLOCK_DIRT, BLOCK_GOLD_ORE,
    BLOCK_GRASS, BLOCK_IRON_ORE, BLOCK_STONE,
};

/// Base surface height before per-column variation.
const BASE_HEIGHT: i32 = 64;

/// Ore placement rule: attempts per chunk within a vertical band.
struct OreRule {
    id: u16,
    attempts: u32,
    max_y: i32,
}

const ORE_RULES: [OreRule; 4] = [
    OreRule {
        id: BLOCK_COAL_ORE,
        attempts: 20,
        max_y: 128,
    },
    OreRule {
        id: BLOCK_IRON_ORE,
        attempts: 12,
        max_y: 64,
    },
    OreRule {
        id: BLOCK_GOLD_ORE,
        attempts: 4,
        max_y: 32,
    },
    OreRule {
        id: BLOCK_DIAMOND_ORE,
        attempts: 2,
        max_y: 16,
    },
];

/// Terrain generator that fills chunks with blocks.
pub struct TerrainGenerator {
    world_seed: u64,
}

impl TerrainGenerator {
    /// Create a new terrain generator from world seed.
    pub fn new(world_seed: u64) -> Self {
        Self { world_seed }
    }

    /// Surface height of a world column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let wave = ((world_x as f32 * 0.11).sin() + (world_z as f32 * 0.07).cos()) * 3.0;
        BASE_HEIGHT + wave.round() as i32
    }

    /// Generate terrain for a chunk at the given position.
    #[instrument(skip(self), fields(chunk_pos = %chunk_pos, world_seed = self.world_seed))]
    pub fn generate_chunk(&self, chunk_pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::new(chunk_pos);

        for local_z in 0..CHUNK_SIZE_Z {
            for local_x in 0..CHUNK_SIZE_X {
                let world_x = chunk_pos.start_x() + local_x;
                let world_z = chunk_pos.start_z() + local_z;
                let height = self.surface_height(world_x, world_z);
                self.generate_column(&mut chunk, world_x, world_z, height);
            }
        }

        let placed = self.generate_ores(&mut chunk);
        debug!(ores = placed, "Terrain generation complete");
        chunk
    }

    /// Generate every chunk within `radius` of the origin into a new world.
    pub fn generate_world(&self, radius: i32) -> World {
        let world = World::new();
        for x in -radius..=radius {
            for z in -radius..=radius {
                world.insert_chunk(self.generate_chunk(ChunkPos::new(x, z)));
            }
        }
        world
    }

    fn generate_column(&self, chunk: &mut Chunk, world_x: i32, world_z: i32, height: i32) {
        let column = |y| BlockPos::new(world_x, y, world_z);
        chunk.set_block(column(0), BlockState::of(BLOCK_BEDROCK));
        for y in 1..height - 3 {
            chunk.set_block(column(y), BlockState::of(BLOCK_STONE));
        }
        for y in (height - 3).max(1)..height {
            chunk.set_block(column(y), BlockState::of(BLOCK_DIRT));
        }
        chunk.set_block(column(height), BlockState::of(BLOCK_GRASS));
    }

    fn generate_ores(&self, chunk: &mut Chunk) -> usize {
        let pos = chunk.position();
        let mut rng = scoped_rng(self.world_seed, pos);
        let mut placed = 0;
        for rule in &ORE_RULES {
            for _ in 0..rule.attempts {
                let target = BlockPos::new(
                    pos.start_x() + rng.gen_range(0..CHUNK_SIZE_X),
                    rng.gen_range(1..rule.max_y),
                    pos.start_z() + rng.gen_range(0..CHUNK_SIZE_Z),
                );
                if chunk.block(target).id == BLOCK_STONE {
                    chunk.set_block(target, BlockState::of(rule.id));
                    placed += 1;
                }
            }
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_ore;

    fn ores(chunk: &Chunk) -> Vec<BlockPos> {
        let pos = chunk.position();
        let mut found = Vec::new();
        for y in 0..chunk.height() {
            for z in 0..CHUNK_SIZE_Z {
                for x in 0..CHUNK_SIZE_X {
                    let block = BlockPos::new(pos.start_x() + x, y, pos.start_z() + z);
                    if is_ore(chunk.block(block).id) {
                        found.push(block);
                    }
                }
            }
        }
        found
    }

    #[test]
    fn generation_is_deterministic() {
        let gen = TerrainGenerator::new(1234);
        let a = gen.generate_chunk(ChunkPos::new(2, -3));
        let b = gen.generate_chunk(ChunkPos::new(2, -3));
        assert_eq!(ores(&a), ores(&b));
        assert_eq!(a.solid_count(), b.solid_count());
    }

    #[test]
    fn columns_are_layered() {
        let gen = TerrainGenerator::new(7);
        let chunk = gen.generate_chunk(ChunkPos::new(0, 0));
        let height = gen.surface_height(5, 5);
        assert_eq!(chunk.block(BlockPos::new(5, 0, 5)).id, BLOCK_BEDROCK);
        assert_eq!(chunk.block(BlockPos::new(5, height, 5)).id, BLOCK_GRASS);
        assert_eq!(chunk.block(BlockPos::new(5, height - 1, 5)).id, BLOCK_DIRT);
        assert!(chunk.block(BlockPos::new(5, height + 1, 5)).is_air());
    }

    #[test]
    fn ores_stay_inside_their_band() {
        let gen = TerrainGenerator::new(99);
        let chunk = gen.generate_chunk(ChunkPos::new(-1, 4));
        let found = ores(&chunk);
        assert!(!found.is_empty());
        for pos in found {
            let id = chunk.block(pos).id;
            let rule = ORE_RULES.iter().find(|rule| rule.id == id).unwrap();
            assert!(pos.y < rule.max_y, "{:?} at {}", id, pos);
        }
    }

    #[test]
    fn generate_world_covers_radius() {
        let world = TerrainGenerator::new(1).generate_world(1);
        assert_eq!(world.len(), 9);
    }
}
