use std::sync::Arc;

use evmwatch_chainclient::ChainClient;
use evmwatch_common::error::PollerError;
use evmwatch_common::types::{Block, LogFilter, Policy, PollerResult, TrackedBlock};
use evmwatch_tracker::Tracker;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::collate::collate;
use crate::entry::PollEntry;
use crate::fetch::fetch;

struct PollerState {
    tracker: Option<Tracker>,
    filter: LogFilter,
    policy: Policy,
    do_reorg: bool,
    do_header: bool,
    /// The Poller's own running watermark, updated from
    /// `result.last_good_block` at the end of every successful `poll`.
    /// Carried as state rather than recomputed from the caller's `from`
    /// so an Emitter-driven window-widening (which passes a smaller
    /// `from` than the true watermark) doesn't regress the Tracker's
    /// retention-prune threshold.
    last_recorded_block: u64,
}

/// Given a block range and a policy, fetches logs and headers, detects
/// reorgs against its own in-memory history, and produces a
/// self-consistent `PollerResult`. The only external dependency is a
/// `ChainClient`; everything else is local state guarded by a single
/// mutex held for the duration of one `poll` call.
pub struct Poller {
    client: Arc<dyn ChainClient>,
    filter_range: u64,
    state: Mutex<PollerState>,
}

impl Poller {
    pub fn new(
        client: Arc<dyn ChainClient>,
        filter_range: u64,
        policy: Policy,
        do_reorg: bool,
        do_header: bool,
    ) -> Self {
        Self {
            client,
            filter_range,
            state: Mutex::new(PollerState {
                tracker: do_reorg.then(Tracker::new),
                filter: LogFilter::default(),
                policy,
                do_reorg,
                do_header,
                last_recorded_block: 0,
            }),
        }
    }

    pub async fn set_policy(&self, policy: Policy) {
        self.state.lock().await.policy = policy;
    }

    pub async fn set_do_header(&self, do_header: bool) {
        self.state.lock().await.do_header = do_header;
    }

    /// `set_do_reorg(false)` prunes the Tracker up to the Poller's own
    /// running watermark and then discards it; `set_do_reorg(true)`
    /// allocates a fresh one if reorg tracking was previously off. Both
    /// transitions are no-ops if the flag was already at the target
    /// value.
    pub async fn set_do_reorg(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        if state.do_reorg == enabled {
            return;
        }
        state.do_reorg = enabled;
        if enabled {
            state.tracker = Some(Tracker::new());
        } else {
            let last_recorded_block = state.last_recorded_block;
            if let Some(tracker) = state.tracker.as_mut() {
                tracker.clear_until(last_recorded_block);
                state.tracker = None;
            }
        }
    }

    pub async fn add_addresses(&self, addresses: Vec<alloy::primitives::Address>) {
        self.state.lock().await.filter.addresses.extend(addresses);
    }

    pub async fn set_addresses(&self, addresses: Vec<alloy::primitives::Address>) {
        self.state.lock().await.filter.addresses = addresses;
    }

    pub async fn add_topics(&self, topics: Vec<Vec<alloy::primitives::B256>>) {
        self.state.lock().await.filter.topics.extend(topics);
    }

    pub async fn set_topics(&self, topics: Vec<Vec<alloy::primitives::B256>>) {
        self.state.lock().await.filter.topics = topics;
    }

    pub async fn poll(&self, ctx: &CancellationToken, from: u64, to: u64) -> Result<PollerResult, PollerError> {
        if from > to {
            return Err(PollerError::BadPolicy(format!(
                "invalid range: from {from} > to {to}"
            )));
        }

        let mut state = self.state.lock().await;
        let PollerState {
            tracker,
            filter,
            policy,
            do_reorg,
            do_header,
            last_recorded_block,
        } = &mut *state;

        if *do_reorg {
            if let Some(tracker) = tracker.as_mut() {
                if *last_recorded_block > 0 {
                    let until = last_recorded_block.saturating_sub(self.filter_range);
                    tracker.clear_until(until);
                }
            }
        }

        let output = fetch(ctx, self.client.as_ref(), filter, from, to, *policy, *do_header).await?;
        let mut entries = collate(output.logs, output.headers)?;

        if let Some(tracker) = tracker.as_ref() {
            for number in from..=to {
                if tracker.get(number).is_some() && !entries.contains_key(&number) {
                    let header = crate::fetch::fetch_single_header(ctx, self.client.as_ref(), number).await?;
                    entries.insert(number, PollEntry::rescued(header.hash));
                }
            }
        }

        if let Some(tracker) = tracker.as_ref() {
            for (number, entry) in entries.iter_mut() {
                if let Some(tracked) = tracker.get(*number) {
                    entry.forked = tracked.hash != entry.hash || tracked.logs.len() != entry.logs.len();
                }
            }
        }

        let mut good_blocks = Vec::new();
        let mut reorged_blocks = Vec::new();

        for number in from..=to {
            let Some(entry) = entries.get(&number) else {
                continue;
            };

            if entry.forked {
                let tracked = tracker
                    .as_ref()
                    .and_then(|t| t.get(number))
                    .ok_or_else(|| PollerError::ProcessReorg {
                        block_number: number,
                        reason: "block marked forked has no tracker entry".to_string(),
                    })?;
                reorged_blocks.push(Block::new(tracked.number, tracked.hash, tracked.logs.clone()));
            }

            if let Some(tracker) = tracker.as_mut() {
                admit(tracker, *policy, number, entry);
            }

            good_blocks.push(Block {
                number,
                hash: entry.hash,
                logs: entry.logs.clone(),
                logs_migrated: entry.logs_migrated,
            });
        }

        let last_good_block = match reorged_blocks.iter().map(|b| b.number).min() {
            Some(min_reorged) => min_reorged.saturating_sub(1).max(from),
            None => to,
        };

        let result = PollerResult {
            from_block: from,
            to_block: to,
            last_good_block,
            good_blocks,
            reorged_blocks,
        };

        *last_recorded_block = result.last_good_block;

        let from_reorged = entries.get(&from).is_some_and(|entry| entry.forked);
        if from_reorged && *do_reorg {
            return Err(PollerError::FromBlockReorged {
                from_block: from,
                result: Box::new(result),
            });
        }

        Ok(result)
    }
}

/// Applies the policy's admission/retention rule for one polled block
/// to the Tracker. Blocks that were just reorged-and-emptied follow the
/// emptied-block rule instead of the plain admission rule.
fn admit(tracker: &mut Tracker, policy: Policy, number: u64, entry: &PollEntry) {
    if entry.forked && entry.logs_migrated {
        match policy {
            Policy::Fast => {
                let _ = tracker.remove(number);
            }
            Policy::Normal | Policy::Expensive => {
                tracker.add(TrackedBlock::new(number, entry.hash, Vec::new()));
            }
        }
        return;
    }

    match policy {
        Policy::Fast => {
            if !entry.logs.is_empty() {
                tracker.add(TrackedBlock::new(
                    number,
                    entry.hash,
                    entry.logs.clone(),
                ));
            }
        }
        Policy::Normal | Policy::Expensive => {
            tracker.add(TrackedBlock::new(
                number,
                entry.hash,
                entry.logs.clone(),
            ));
        }
    }
}
