use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A single event log, carrying just the addressing fields the core needs
/// to classify and order it. The payload itself is left opaque — the
/// core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub log_index: u64,
    /// Up to 4 indexed topics, per the EVM LOG0..LOG4 opcodes.
    pub topics: Vec<B256>,
    pub address: Address,
    /// Opaque ABI-encoded payload. The core never decodes this.
    #[serde(default)]
    pub data: Vec<u8>,
}

/// A polled block together with the logs of interest it carried.
///
/// `logs_migrated == true` implies `logs.is_empty()`: the block used to
/// have interesting logs, but a reorg moved or removed them, and this
/// value represents the fresh (now-empty) view of that block number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: B256,
    pub logs: Vec<Log>,
    pub logs_migrated: bool,
}

impl Block {
    pub fn new(number: u64, hash: B256, logs: Vec<Log>) -> Self {
        Self {
            number,
            hash,
            logs,
            logs_migrated: false,
        }
    }

    pub fn migrated(number: u64, hash: B256) -> Self {
        Self {
            number,
            hash,
            logs: Vec::new(),
            logs_migrated: true,
        }
    }
}

/// The Poller's in-memory record of a previously-observed canonical block.
/// Structurally identical to `Block` minus the `logs_migrated` flag, which
/// only has meaning for a freshly-polled block, never for a stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBlock {
    pub number: u64,
    pub hash: B256,
    pub logs: Vec<Log>,
}

impl TrackedBlock {
    pub fn new(number: u64, hash: B256, logs: Vec<Log>) -> Self {
        Self { number, hash, logs }
    }
}

impl From<&Block> for TrackedBlock {
    fn from(block: &Block) -> Self {
        Self {
            number: block.number,
            hash: block.hash,
            logs: block.logs.clone(),
        }
    }
}

impl From<&TrackedBlock> for Block {
    fn from(tracked: &TrackedBlock) -> Self {
        Self {
            number: tracked.number,
            hash: tracked.hash,
            logs: tracked.logs.clone(),
            logs_migrated: false,
        }
    }
}

/// The self-consistent output of one `Poller::poll` call.
///
/// `good_blocks` and `reorged_blocks` are each strictly ascending by
/// block number; every number in either set lies in `[from_block,
/// to_block]`; `last_good_block` is always in `[from_block, to_block]`
/// and is strictly less than the smallest reorged block number, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerResult {
    pub from_block: u64,
    pub to_block: u64,
    pub last_good_block: u64,
    pub good_blocks: Vec<Block>,
    pub reorged_blocks: Vec<Block>,
}

/// The minimal header fields the Poller needs from a `ChainClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub number: u64,
    pub hash: B256,
    pub nonce: [u8; 8],
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
}

/// Selects the Poller's fetch strategy and Tracker admission/retention
/// behavior for a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Policy {
    /// Admit only blocks with >= 1 log to the Tracker; drop a
    /// reorged-and-emptied block from the Tracker entirely.
    Fast,
    /// Admit every polled block to the Tracker; keep a
    /// reorged-and-emptied block (with updated hash, no logs) until it
    /// scrolls out of the retention window. Fetches logs first, then
    /// headers only for blocks that had logs.
    #[default]
    Normal,
    /// Same admission/retention behavior as `Normal`, but fetches
    /// headers and logs concurrently for the entire block range.
    Expensive,
}

/// An opaque, service-defined value threaded through the Engine's
/// per-block state and returned to the `ServiceEngine` on the next call
/// for that block. The core preserves it but never inspects its shape.
pub type Artifact = serde_json::Value;

/// A filter over the address/topic dimensions of `ChainClient::filter_logs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    /// Each inner `Vec` is an OR-set for that topic position; positions
    /// beyond `len()` are unconstrained. Mirrors the semantics of
    /// `eth_getLogs`'s `topics` parameter.
    pub topics: Vec<Vec<B256>>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_and_tracked_block_round_trip() {
        let block = Block::new(
            10,
            B256::from([7; 32]),
            vec![Log {
                block_number: 10,
                block_hash: B256::from([7; 32]),
                tx_hash: B256::from([1; 32]),
                log_index: 0,
                topics: vec![],
                address: Address::ZERO,
                data: vec![],
            }],
        );

        let tracked = TrackedBlock::from(&block);
        let back: Block = (&tracked).into();

        assert_eq!(back.number, block.number);
        assert_eq!(back.hash, block.hash);
        assert_eq!(back.logs, block.logs);
        assert!(!back.logs_migrated);
    }
}
