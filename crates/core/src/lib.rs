#![warn(missing_docs)]
//! Core primitives shared across the workspace: coordinates, block states and
//! the host-facing access traits.

mod access;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use access::{ChunkAccess, WorldAccess};

/// Chunk width (X axis) in blocks.
pub const CHUNK_SIZE_X: i32 = 16;
/// Chunk depth (Z axis) in blocks.
pub const CHUNK_SIZE_Z: i32 = 16;

/// Block identifier referencing the host's block registry.
pub type BlockId = u16;

/// Chunk coordinate (X,Z) in chunk space.
/// Implements Ord for deterministic iteration in BTreeMap/BTreeSet (sorts by x, then z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk column X.
    pub x: i32,
    /// Chunk column Z.
    pub z: i32,
}

impl ChunkPos {
    /// Build a chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World X of the chunk's first block column.
    #[inline]
    pub const fn start_x(self) -> i32 {
        self.x * CHUNK_SIZE_X
    }

    /// World Z of the chunk's first block column.
    #[inline]
    pub const fn start_z(self) -> i32 {
        self.z * CHUNK_SIZE_Z
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Absolute block position in world space.
///
/// `BlockPos` is a `Copy` value: every callback receives its own snapshot, so
/// keeping one past the call never aliases producer-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// World X.
    pub x: i32,
    /// World Y.
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl BlockPos {
    /// Build a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk column containing this block.
    #[inline]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(
            self.x.div_euclid(CHUNK_SIZE_X),
            self.z.div_euclid(CHUNK_SIZE_Z),
        )
    }

    /// Position relative to the owning chunk's origin (x and z in 0..16).
    #[inline]
    pub const fn local(self) -> (usize, i32, usize) {
        (
            self.x.rem_euclid(CHUNK_SIZE_X) as usize,
            self.y,
            self.z.rem_euclid(CHUNK_SIZE_Z) as usize,
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block type plus variant bits, as reported by the host.
///
/// Treated as an opaque immutable value by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockState {
    /// Registry id of the block type.
    pub id: BlockId,
    /// Variant/metadata bits.
    pub meta: u16,
}

impl BlockState {
    /// The empty block.
    pub const AIR: Self = Self { id: 0, meta: 0 };

    /// Plain state for `id` with no variant bits.
    pub const fn of(id: BlockId) -> Self {
        Self { id, meta: 0 }
    }

    /// True for air.
    #[inline]
    pub fn is_air(&self) -> bool {
        self.id == Self::AIR.id
    }
}

/// Helper to derive a reproducible RNG seeded by world + chunk domains.
pub fn scoped_rng(world_seed: u64, chunk: ChunkPos) -> StdRng {
    let chunk_hash = ((chunk.x as u32 as u64) << 32) | (chunk.z as u32 as u64);
    StdRng::seed_from_u64(world_seed ^ chunk_hash.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
