//! In-memory host world: chunk storage, the active-world slot and a small
//! deterministic terrain generator.

mod chunk;
mod host;
mod terrain;

pub use chunk::*;
pub use host::*;
pub use terrain::*;

use blockwatch_core::BlockId;

/// Default chunk height in blocks.
pub const CHUNK_HEIGHT: i32 = 256;

/// Reserved ID for air.
pub const BLOCK_AIR: BlockId = 0;

/// ID for stone block.
pub const BLOCK_STONE: BlockId = 1;

/// ID for dirt.
pub const BLOCK_DIRT: BlockId = 2;

/// ID for grass.
pub const BLOCK_GRASS: BlockId = 3;

/// ID for bedrock.
pub const BLOCK_BEDROCK: BlockId = 7;

/// ID for coal ore (spawns y: 0-128).
pub const BLOCK_COAL_ORE: BlockId = 14;

/// ID for iron ore (spawns y: 0-64).
pub const BLOCK_IRON_ORE: BlockId = 15;

/// ID for gold ore (spawns y: 0-32).
pub const BLOCK_GOLD_ORE: BlockId = 16;

/// ID for diamond ore (spawns y: 0-16).
pub const BLOCK_DIAMOND_ORE: BlockId = 17;

/// Returns true for the ore blocks the generator scatters.
pub fn is_ore(id: BlockId) -> bool {
    matches!(
        id,
        BLOCK_COAL_ORE | BLOCK_IRON_ORE | BLOCK_GOLD_ORE | BLOCK_DIAMOND_ORE
    )
}
