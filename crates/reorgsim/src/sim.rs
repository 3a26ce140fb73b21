use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::B256;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use evmwatch_chainclient::{ChainClient, ChainClientError};
use evmwatch_common::types::{Header, Log, LogFilter};

use crate::fork::{fork_hash, fork_logs};

/// Schedules a reorg of every block at or after `reorged_at`, taking
/// effect starting with the `trigger_after_polls`-th call to
/// `filter_logs` (0-indexed, so `0` means "reorged from the first
/// poll"). Multiple events compose: a block is forked once per
/// triggered event whose `reorged_at` it falls at or after, each
/// producing a distinct, reproducible hash.
#[derive(Debug, Clone, Copy)]
pub struct ReorgEvent {
    pub reorged_at: u64,
    pub trigger_after_polls: usize,
    /// When set, the forked block carries no logs at all, simulating a
    /// reorg that moved its logs to a different block rather than one
    /// that just re-mined the same transactions under a new hash.
    pub migrates_logs: bool,
}

impl ReorgEvent {
    pub fn new(reorged_at: u64, trigger_after_polls: usize) -> Self {
        Self {
            reorged_at,
            trigger_after_polls,
            migrates_logs: false,
        }
    }

    pub fn migrating(reorged_at: u64, trigger_after_polls: usize) -> Self {
        Self {
            reorged_at,
            trigger_after_polls,
            migrates_logs: true,
        }
    }
}

/// A `ChainClient` backed by a fixed, in-memory chain plus a schedule
/// of reorg events. `block_number()` reports a fixed head; callers
/// drive the window themselves, same as a real Emitter would against a
/// real node's tip.
pub struct ReorgSim {
    chain: BTreeMap<u64, (B256, Vec<Log>)>,
    events: Vec<ReorgEvent>,
    polls: AtomicUsize,
    /// The generation `filter_logs` resolved against on its most recent
    /// call. `header_by_number` reads this instead of `polls` directly,
    /// so a `Poller::poll` round's header lookups agree with the logs
    /// lookup that started it rather than seeing `polls` one generation
    /// ahead once `filter_logs` has already advanced it.
    current_round: AtomicUsize,
    head: u64,
}

impl ReorgSim {
    pub fn new(chain: BTreeMap<u64, (B256, Vec<Log>)>, events: Vec<ReorgEvent>, head: u64) -> Self {
        Self {
            chain,
            events,
            polls: AtomicUsize::new(0),
            current_round: AtomicUsize::new(0),
            head,
        }
    }

    fn triggered(&self, number: u64, polls: usize) -> Vec<&ReorgEvent> {
        self.events
            .iter()
            .filter(|event| polls >= event.trigger_after_polls && number >= event.reorged_at)
            .collect()
    }

    fn resolve(&self, number: u64, polls: usize) -> Option<(B256, Vec<Log>)> {
        let (hash, logs) = self.chain.get(&number)?.clone();
        let triggered = self.triggered(number, polls);
        if triggered.is_empty() {
            return Some((hash, logs));
        }

        let generation = triggered.len() as u32;
        let migrates = triggered.iter().any(|event| event.migrates_logs);
        let new_hash = fork_hash(number, generation);
        let new_logs = if migrates {
            Vec::new()
        } else {
            fork_logs(&logs, new_hash, generation)
        };
        Some((new_hash, new_logs))
    }
}

#[async_trait]
impl ChainClient for ReorgSim {
    async fn block_number(&self, _ctx: &CancellationToken) -> Result<u64, ChainClientError> {
        Ok(self.head)
    }

    async fn filter_logs(
        &self,
        _ctx: &CancellationToken,
        _filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainClientError> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst);
        self.current_round.store(polls, Ordering::SeqCst);

        let mut logs = Vec::new();
        for number in from_block..=to_block {
            if let Some((_, block_logs)) = self.resolve(number, polls) {
                logs.extend(block_logs);
            }
        }
        Ok(logs)
    }

    async fn header_by_number(&self, _ctx: &CancellationToken, number: u64) -> Result<Header, ChainClientError> {
        let polls = self.current_round.load(Ordering::SeqCst);
        let (hash, _) = self
            .resolve(number, polls)
            .ok_or(ChainClientError::BlockNotFound(number))?;

        Ok(Header {
            number,
            hash,
            nonce: [0; 8],
            timestamp: 0,
            gas_limit: 0,
            gas_used: 0,
        })
    }
}
