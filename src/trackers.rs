//! Subscribers used by the demo binary.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use blockwatch_core::{BlockId, BlockPos, BlockState, ChunkPos};
use blockwatch_scanner::BlockChangeSubscriber;
use blockwatch_world::is_ore;

type OreIndex = HashMap<ChunkPos, HashMap<BlockPos, BlockId>>;

/// Keeps the position of every ore block in loaded chunks, the way an xray
/// overlay would.
#[derive(Default)]
pub struct OreTracker {
    label: String,
    ores: Mutex<OreIndex>,
}

impl OreTracker {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ores: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OreIndex> {
        self.ores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ores currently known.
    pub fn total(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    /// Ore counts by block id.
    pub fn by_kind(&self) -> BTreeMap<BlockId, usize> {
        let mut counts = BTreeMap::new();
        for chunk in self.lock().values() {
            for id in chunk.values() {
                *counts.entry(*id).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Chunks holding at least one ore.
    pub fn chunks_with_ores(&self) -> usize {
        self.lock().values().filter(|ores| !ores.is_empty()).count()
    }
}

impl BlockChangeSubscriber for OreTracker {
    fn record_block(&self, pos: BlockPos, state: BlockState, _cleared: bool) {
        let mut ores = self.lock();
        if is_ore(state.id) {
            ores.entry(pos.chunk()).or_default().insert(pos, state.id);
        } else if let Some(chunk) = ores.get_mut(&pos.chunk()) {
            chunk.remove(&pos);
        }
    }

    fn chunk_update(&self, x: i32, z: i32) {
        // A full scan follows and repopulates the chunk.
        self.lock().remove(&ChunkPos::new(x, z));
    }

    fn clear_chunk(&self, x: i32, z: i32) {
        self.lock().remove(&ChunkPos::new(x, z));
    }

    fn clear_all_chunks(&self) {
        self.lock().clear();
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Counts chunk and block activity without looking at full-scan contents.
#[derive(Default)]
pub struct ChunkActivity {
    chunk_updates: AtomicU64,
    chunk_unloads: AtomicU64,
    block_changes: AtomicU64,
    resets: AtomicU64,
}

/// Counter values of a [`ChunkActivity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ActivitySummary {
    pub chunk_updates: u64,
    pub chunk_unloads: u64,
    pub block_changes: u64,
    pub resets: u64,
}

impl ChunkActivity {
    pub fn summary(&self) -> ActivitySummary {
        ActivitySummary {
            chunk_updates: self.chunk_updates.load(Ordering::Relaxed),
            chunk_unloads: self.chunk_unloads.load(Ordering::Relaxed),
            block_changes: self.block_changes.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

impl BlockChangeSubscriber for ChunkActivity {
    fn should_call_record_block_on_chunk_update(&self) -> bool {
        false
    }

    fn record_block(&self, _pos: BlockPos, _state: BlockState, _cleared: bool) {
        self.block_changes.fetch_add(1, Ordering::Relaxed);
    }

    fn chunk_update(&self, _x: i32, _z: i32) {
        self.chunk_updates.fetch_add(1, Ordering::Relaxed);
    }

    fn clear_chunk(&self, _x: i32, _z: i32) {
        self.chunk_unloads.fetch_add(1, Ordering::Relaxed);
    }

    fn clear_all_chunks(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "chunk-activity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwatch_world::{BLOCK_DIAMOND_ORE, BLOCK_IRON_ORE, BLOCK_STONE};

    fn tracks(tracker: &OreTracker, pos: BlockPos) -> bool {
        tracker
            .lock()
            .get(&pos.chunk())
            .is_some_and(|ores| ores.contains_key(&pos))
    }

    #[test]
    fn ore_tracker_follows_block_changes() {
        let tracker = OreTracker::new("ores");
        let pos = BlockPos::new(3, 10, -20);
        tracker.record_block(pos, BlockState::of(BLOCK_DIAMOND_ORE), true);
        tracker.record_block(BlockPos::new(4, 10, -20), BlockState::of(BLOCK_STONE), true);
        assert_eq!(tracker.total(), 1);
        assert!(tracks(&tracker, pos));

        // Mined out.
        tracker.record_block(pos, BlockState::AIR, false);
        assert_eq!(tracker.total(), 0);
        assert!(!tracks(&tracker, pos));
    }

    #[test]
    fn ore_tracker_drops_chunks_on_update_and_unload() {
        let tracker = OreTracker::new("ores");
        let a = BlockPos::new(1, 5, 1);
        let b = BlockPos::new(17, 5, 1);
        tracker.record_block(a, BlockState::of(BLOCK_IRON_ORE), true);
        tracker.record_block(b, BlockState::of(BLOCK_DIAMOND_ORE), true);
        assert_eq!(tracker.chunks_with_ores(), 2);

        tracker.chunk_update(0, 0);
        assert!(!tracks(&tracker, a));
        assert!(tracks(&tracker, b));

        tracker.clear_chunk(1, 0);
        assert_eq!(tracker.total(), 0);

        tracker.record_block(a, BlockState::of(BLOCK_IRON_ORE), true);
        tracker.clear_all_chunks();
        assert_eq!(tracker.total(), 0);
    }

    #[test]
    fn ore_counts_are_grouped_by_kind() {
        let tracker = OreTracker::new("ores");
        tracker.record_block(BlockPos::new(0, 1, 0), BlockState::of(BLOCK_IRON_ORE), true);
        tracker.record_block(BlockPos::new(0, 2, 0), BlockState::of(BLOCK_IRON_ORE), true);
        tracker.record_block(BlockPos::new(0, 3, 0), BlockState::of(BLOCK_DIAMOND_ORE), true);
        let counts = tracker.by_kind();
        assert_eq!(counts.get(&BLOCK_IRON_ORE), Some(&2));
        assert_eq!(counts.get(&BLOCK_DIAMOND_ORE), Some(&1));
    }

    #[test]
    fn activity_counts_every_callback() {
        let activity = ChunkActivity::default();
        assert!(!activity.should_call_record_block_on_chunk_update());
        activity.chunk_update(0, 0);
        activity.chunk_update(1, 0);
        activity.clear_chunk(1, 0);
        activity.record_block(BlockPos::new(0, 0, 0), BlockState::AIR, false);
        activity.clear_all_chunks();
        assert_eq!(
            activity.summary(),
            ActivitySummary {
                chunk_updates: 2,
                chunk_unloads: 1,
                block_changes: 1,
                resets: 1,
            }
        );
    }
}
