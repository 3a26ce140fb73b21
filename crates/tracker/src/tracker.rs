use thiserror::Error;

use evmwatch_common::types::TrackedBlock;

use crate::ordered_map::OrderedMap;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("block {0} is not present in the tracker")]
    NotFound(u64),
}

/// The Poller's bounded in-memory history of recently-seen canonical
/// blocks, keyed by block number. Single-owner: the Poller holds
/// exclusive access to it for the duration of one `poll` call.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    blocks: OrderedMap<TrackedBlock>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            blocks: OrderedMap::new(),
        }
    }

    /// Inserts or replaces the entry at `block.number`.
    pub fn add(&mut self, block: TrackedBlock) {
        self.blocks.insert(block.number, block);
    }

    pub fn get(&self, number: u64) -> Option<&TrackedBlock> {
        self.blocks.get(number)
    }

    /// Removes the entry at `number`. Fails if `number` is not present.
    pub fn remove(&mut self, number: u64) -> Result<(), TrackerError> {
        self.blocks
            .remove(number)
            .map(|_| ())
            .ok_or(TrackerError::NotFound(number))
    }

    /// Removes every entry with key `<= number`.
    pub fn clear_until(&mut self, number: u64) {
        let removed = self.blocks.clear_until(number);
        if removed > 0 {
            tracing::debug!(until = number, removed, "tracker pruned");
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn tracked(number: u64) -> TrackedBlock {
        TrackedBlock::new(number, B256::from([number as u8; 32]), Vec::new())
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut tracker = Tracker::new();
        tracker.add(tracked(10));

        assert_eq!(tracker.get(10), Some(&tracked(10)));
        assert_eq!(tracker.get(11), None);
    }

    #[test]
    fn add_replaces_existing_entry_at_same_number() {
        let mut tracker = Tracker::new();
        tracker.add(tracked(10));

        let mut updated = tracked(10);
        updated.hash = B256::from([0xff; 32]);
        tracker.add(updated.clone());

        assert_eq!(tracker.get(10), Some(&updated));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn remove_missing_block_fails() {
        let mut tracker = Tracker::new();
        assert_eq!(tracker.remove(5), Err(TrackerError::NotFound(5)));
    }

    #[test]
    fn remove_present_block_succeeds() {
        let mut tracker = Tracker::new();
        tracker.add(tracked(5));

        assert!(tracker.remove(5).is_ok());
        assert_eq!(tracker.get(5), None);
    }

    #[test]
    fn clear_until_drops_entries_at_or_below_bound() {
        let mut tracker = Tracker::new();
        for n in [1, 2, 3, 10] {
            tracker.add(tracked(n));
        }

        tracker.clear_until(3);

        assert_eq!(tracker.len(), 1);
        assert!(tracker.get(10).is_some());
    }
}
