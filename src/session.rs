//! Scripted host session: generate a world, stream its events through the
//! scanner and collect what the subscribers saw.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use blockwatch_core::{BlockPos, BlockState, ChunkPos, WorldAccess, CHUNK_SIZE_X, CHUNK_SIZE_Z};
use blockwatch_scanner::{ChunkScanner, MetricsSnapshot};
use blockwatch_world::{is_ore, Host, TerrainGenerator, World, BLOCK_AIR, BLOCK_DIAMOND_ORE, CHUNK_HEIGHT};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::trackers::{ActivitySummary, ChunkActivity, OreTracker};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub chunks_loaded: usize,
    pub ores_after_load: usize,
    pub ores_caught_up: usize,
    pub edits_applied: usize,
    pub ores_after_edits: usize,
    pub ores_expected: usize,
    pub chunks_with_ores: usize,
    pub ore_kinds: BTreeMap<u16, usize>,
    pub chunks_unloaded: usize,
    pub ores_after_unload: usize,
    pub ores_after_world_change: usize,
    pub activity: ActivitySummary,
    pub metrics: MetricsSnapshot,
}

async fn settle(scanner: &ChunkScanner) -> Result<()> {
    tokio::time::timeout(SETTLE_TIMEOUT, scanner.wait_until_idle())
        .await
        .context("scanner did not settle")
}

/// Ores stored in `world`, counted block by block.
pub fn count_ores(world: &World) -> usize {
    let mut total = 0;
    for pos in world.loaded_positions() {
        let Some(chunk) = world.get(pos) else {
            continue;
        };
        for y in 0..CHUNK_HEIGHT {
            for z in 0..CHUNK_SIZE_Z {
                for x in 0..CHUNK_SIZE_X {
                    let block = BlockPos::new(pos.start_x() + x, y, pos.start_z() + z);
                    if is_ore(chunk.block(block).id) {
                        total += 1;
                    }
                }
            }
        }
    }
    total
}

#[instrument(skip_all, fields(seed = config.demo.seed, radius = config.demo.radius))]
pub async fn run(config: &AppConfig) -> Result<SessionReport> {
    let demo = &config.demo;
    let world = Arc::new(TerrainGenerator::new(demo.seed).generate_world(demo.radius));
    let host = Arc::new(Host::new());
    let scanner = ChunkScanner::start(
        config.scanner.clone(),
        Arc::clone(&host) as Arc<dyn WorldAccess>,
    );

    let ores = Arc::new(OreTracker::new("ores"));
    let activity = Arc::new(ChunkActivity::default());
    scanner.subscribe(ores.clone()).await?;
    scanner.subscribe(activity.clone()).await?;

    host.set_world(Arc::clone(&world));
    let positions = world.loaded_positions();
    for pos in &positions {
        scanner.on_chunk_load(pos.x, pos.z).await?;
    }
    settle(&scanner).await?;
    let ores_after_load = ores.total();
    info!(chunks = positions.len(), ores = ores_after_load, "Initial load scanned");

    // Joins late and gets a catch-up scan of everything already loaded.
    let late = Arc::new(OreTracker::new("late-ores"));
    scanner.subscribe(late.clone()).await?;
    settle(&scanner).await?;
    let ores_caught_up = late.total();

    // Block notifications are not ordered against each other, so each position
    // is edited at most once.
    let mut rng = StdRng::seed_from_u64(demo.seed);
    let mut edited = HashSet::new();
    let mut attempts = 0;
    while edited.len() < demo.edits && attempts < demo.edits * 4 && !positions.is_empty() {
        attempts += 1;
        let chunk = positions[rng.gen_range(0..positions.len())];
        let pos = BlockPos::new(
            chunk.start_x() + rng.gen_range(0..CHUNK_SIZE_X),
            rng.gen_range(1..48),
            chunk.start_z() + rng.gen_range(0..CHUNK_SIZE_Z),
        );
        if !edited.insert(pos) {
            continue;
        }
        let state = if rng.gen_bool(0.5) {
            BlockState::of(BLOCK_DIAMOND_ORE)
        } else {
            BlockState::of(BLOCK_AIR)
        };
        world.set_block(pos, state)?;
        scanner.on_block_change(pos, state).await?;
    }
    let edits_applied = edited.len();
    settle(&scanner).await?;
    let ores_after_edits = ores.total();
    let ores_expected = count_ores(&world);
    let ore_kinds = ores.by_kind();
    let chunks_with_ores = ores.chunks_with_ores();

    let ring: Vec<ChunkPos> = positions
        .iter()
        .copied()
        .filter(|pos| demo.radius > 0 && pos.x.abs().max(pos.z.abs()) == demo.radius)
        .collect();
    for pos in &ring {
        world.remove_chunk(*pos);
        scanner.on_chunk_unload(pos.x, pos.z).await?;
    }
    settle(&scanner).await?;
    let ores_after_unload = ores.total();
    info!(unloaded = ring.len(), ores = ores_after_unload, "Outer ring unloaded");

    host.clear_world();
    scanner.on_world_change();
    let ores_after_world_change = ores.total();

    let report = SessionReport {
        chunks_loaded: positions.len(),
        ores_after_load,
        ores_caught_up,
        edits_applied,
        ores_after_edits,
        ores_expected,
        chunks_with_ores,
        ore_kinds,
        chunks_unloaded: ring.len(),
        ores_after_unload,
        ores_after_world_change,
        activity: activity.summary(),
        metrics: scanner.metrics(),
    };
    scanner.shutdown().await;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoConfig;

    fn small_config(radius: i32, edits: usize) -> AppConfig {
        AppConfig {
            demo: DemoConfig {
                seed: 42,
                radius,
                edits,
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn trackers_agree_with_the_world() {
        let report = run(&small_config(1, 32)).await.unwrap();

        assert_eq!(report.chunks_loaded, 9);
        assert_eq!(report.ores_caught_up, report.ores_after_load);
        assert_eq!(report.edits_applied, 32);
        assert_eq!(report.ores_after_edits, report.ores_expected);
        assert_eq!(report.chunks_unloaded, 8);
        assert!(report.ores_after_unload <= report.ores_after_edits);
        assert_eq!(report.ores_after_world_change, 0);

        assert_eq!(report.activity.chunk_updates, 9);
        assert_eq!(report.activity.block_changes, report.edits_applied as u64);
        assert_eq!(report.ore_kinds.values().sum::<usize>(), report.ores_after_edits);
        assert!(report.chunks_with_ores <= report.chunks_loaded);
        assert_eq!(report.chunks_with_ores > 0, report.ores_after_edits > 0);
        assert_eq!(report.activity.chunk_unloads, 8);
        assert_eq!(report.activity.resets, 1);
        assert_eq!(report.metrics.chunks_scanned, 18);
        assert_eq!(report.metrics.dispatch_errors, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn session_is_deterministic_for_a_seed() {
        let first = run(&small_config(0, 16)).await.unwrap();
        let second = run(&small_config(0, 16)).await.unwrap();
        assert_eq!(first.ores_after_edits, second.ores_after_edits);
        assert_eq!(first.ores_expected, second.ores_expected);
        assert_eq!(first.chunks_unloaded, 0);
    }

    #[test]
    fn count_ores_sees_generated_ores() {
        let world = TerrainGenerator::new(7).generate_world(0);
        let pos = BlockPos::new(2, 30, 2);
        world.set_block(pos, BlockState::of(BLOCK_AIR)).unwrap();
        let without = count_ores(&world);
        world.set_block(pos, BlockState::of(BLOCK_DIAMOND_ORE)).unwrap();
        assert_eq!(count_ores(&world), without + 1);
    }
}
