//! Drives the real `Poller` against `ReorgSim` for the end-to-end
//! scenarios the design is meant to handle. `FetchMismatch` is covered
//! by unit tests closer to where it lives (`evmwatch-poller`'s
//! `collate` module). The Engine's post-widening dedupe across two
//! distinct `PollerResult`s sharing a block number is covered in
//! `evmwatch-engine`'s `engine` module, since it requires driving the
//! Engine directly rather than just the Poller.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use evmwatch_common::error::PollerError;
use evmwatch_common::types::{Log, Policy};
use evmwatch_poller::Poller;
use evmwatch_reorgsim::{ReorgEvent, ReorgSim};
use tokio_util::sync::CancellationToken;

fn hash(seed: u8) -> B256 {
    B256::from([seed; 32])
}

fn log(number: u64, block_hash: B256) -> Log {
    Log {
        block_number: number,
        block_hash,
        tx_hash: hash(number as u8),
        log_index: 0,
        topics: vec![],
        address: Address::ZERO,
        data: vec![],
    }
}

fn one_log_per_block(numbers: impl Iterator<Item = u64>) -> BTreeMap<u64, (B256, Vec<Log>)> {
    numbers
        .map(|n| {
            let h = hash(n as u8);
            (n, (h, vec![log(n, h)]))
        })
        .collect()
}

#[tokio::test]
async fn s1_simple_advance_has_no_reorgs() {
    let ctx = CancellationToken::new();
    let sim = Arc::new(ReorgSim::new(one_log_per_block(1..=6), vec![], 100));
    let poller = Poller::new(sim, 3, Policy::Normal, true, true);

    let first = poller.poll(&ctx, 1, 3).await.unwrap();
    assert!(first.reorged_blocks.is_empty());
    assert_eq!(first.last_good_block, 3);

    let second = poller.poll(&ctx, 4, 6).await.unwrap();
    assert!(second.reorged_blocks.is_empty());
    assert_eq!(second.last_good_block, 6);
}

#[tokio::test]
async fn s2_reorg_with_same_log_count_is_reported() {
    let ctx = CancellationToken::new();
    let chain = one_log_per_block(1..=5);
    let sim = Arc::new(ReorgSim::new(chain, vec![ReorgEvent::new(5, 1)], 100));
    let poller = Poller::new(sim, 5, Policy::Normal, true, true);

    let first = poller.poll(&ctx, 1, 5).await.unwrap();
    assert!(first.reorged_blocks.is_empty());

    let second = poller.poll(&ctx, 1, 5).await.unwrap();
    assert_eq!(second.reorged_blocks.len(), 1);
    assert_eq!(second.reorged_blocks[0].number, 5);
    assert_eq!(second.reorged_blocks[0].logs.len(), 1);
    assert_eq!(second.last_good_block, 4);
}

#[tokio::test]
async fn s3_reorg_that_migrates_logs_leaves_an_empty_block_behind() {
    let ctx = CancellationToken::new();
    let chain = one_log_per_block(1..=5);
    let sim = Arc::new(ReorgSim::new(chain, vec![ReorgEvent::migrating(5, 1)], 100));
    let poller = Poller::new(sim, 5, Policy::Normal, true, true);

    let first = poller.poll(&ctx, 1, 5).await.unwrap();
    assert!(first.reorged_blocks.is_empty());

    let second = poller.poll(&ctx, 1, 5).await.unwrap();
    assert_eq!(second.reorged_blocks.len(), 1);
    assert_eq!(second.reorged_blocks[0].number, 5);

    let rescued = second
        .good_blocks
        .iter()
        .find(|b| b.number == 5)
        .expect("block 5 present in good_blocks with its fresh state");
    assert!(rescued.logs.is_empty());
    assert!(rescued.logs_migrated);
}

#[tokio::test]
async fn s4_from_block_itself_reorged_returns_a_sentinel_with_partial_result() {
    let ctx = CancellationToken::new();
    let chain = one_log_per_block(1..=3);
    let sim = Arc::new(ReorgSim::new(chain, vec![ReorgEvent::new(1, 1)], 100));
    let poller = Poller::new(sim, 3, Policy::Normal, true, true);

    poller.poll(&ctx, 1, 3).await.unwrap();

    match poller.poll(&ctx, 1, 3).await {
        Err(PollerError::FromBlockReorged { from_block, result }) => {
            assert_eq!(from_block, 1);
            assert_eq!(result.reorged_blocks[0].number, 1);
        }
        other => panic!("expected FromBlockReorged, got {other:?}"),
    }
}
