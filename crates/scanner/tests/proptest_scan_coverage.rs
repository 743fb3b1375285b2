//! Property tests: full-scan coverage and queue ordering over random inputs.

use std::collections::HashSet;
use std::sync::Arc;

use blockwatch_core::{BlockState, ChunkPos, WorldAccess, CHUNK_SIZE_X, CHUNK_SIZE_Z};
use blockwatch_scanner::{ChunkScanner, ScannerConfig};
use blockwatch_testkit::{
    host_in, pattern_id, patterned_chunk, shallow_world, within, RecordingSubscriber,
    DEFAULT_TIMEOUT,
};
use blockwatch_world::{World, CHUNK_HEIGHT};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    #[test]
    fn full_scan_reports_every_position_exactly_once(x in -2000i32..2000, z in -2000i32..2000) {
        let pos = ChunkPos::new(x, z);
        let world = World::new();
        world.insert_chunk(patterned_chunk(pos));
        let host = host_in(Arc::new(world));

        let (recorded, distinct) = runtime().block_on(async {
            let scanner = ChunkScanner::start(ScannerConfig::default(), host as Arc<dyn WorldAccess>);
            let sub = Arc::new(RecordingSubscriber::new("coverage"));
            scanner.subscribe(sub.clone()).await.unwrap();
            scanner.on_chunk_load(x, z).await.unwrap();
            within(DEFAULT_TIMEOUT, scanner.wait_until_idle()).await.unwrap();
            scanner.shutdown().await;
            (sub.recorded(true), sub.recorded_positions(true))
        });

        let expected = (CHUNK_SIZE_X * CHUNK_SIZE_Z * CHUNK_HEIGHT) as usize;
        prop_assert_eq!(recorded.len(), expected);
        prop_assert_eq!(distinct.len(), expected);
        for (block, state) in recorded {
            prop_assert_eq!(block.chunk(), pos);
            prop_assert!((0..CHUNK_HEIGHT).contains(&block.y));
            prop_assert_eq!(state, BlockState::of(pattern_id(block)));
        }
    }

    #[test]
    fn chunk_updates_arrive_in_submission_order(
        order in proptest::collection::vec((-8i32..8, -8i32..8), 1..40)
    ) {
        let positions: Vec<ChunkPos> = order.iter().map(|&(x, z)| ChunkPos::new(x, z)).collect();
        let unique: Vec<ChunkPos> = positions
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let host = host_in(shallow_world(&unique, 1));

        let seen = runtime().block_on(async {
            let scanner = ChunkScanner::start(ScannerConfig::default(), host as Arc<dyn WorldAccess>);
            let sub = Arc::new(RecordingSubscriber::opted_out("order"));
            scanner.subscribe(sub.clone()).await.unwrap();
            for pos in &positions {
                scanner.on_chunk_delta_update(pos.x, pos.z).await.unwrap();
            }
            within(DEFAULT_TIMEOUT, scanner.wait_until_idle()).await.unwrap();
            scanner.shutdown().await;
            sub.chunk_updates()
        });

        prop_assert_eq!(seen, positions);
    }
}
