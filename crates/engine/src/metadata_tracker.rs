use evmwatch_common::types::Artifact;
use evmwatch_tracker::OrderedMap;
use thiserror::Error;

/// Per-block lifecycle state. A reorged block's old logs must be
/// compensated exactly once, and a fresh block's new logs processed
/// exactly once — this state machine absorbs the case where the same
/// block number appears in more than one `PollerResult`, which happens
/// whenever the Emitter widens its window after a `FromBlockReorged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState {
    #[default]
    Null,
    Seen,
    Processed,
    Reorged,
    ReorgHandled,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal transition: event {event} in state {state:?}")]
pub struct IllegalTransition {
    state: BlockState,
    event: &'static str,
}

impl BlockState {
    pub fn on_got_log(self) -> Result<BlockState, IllegalTransition> {
        match self {
            BlockState::Null | BlockState::Seen | BlockState::ReorgHandled => Ok(BlockState::Seen),
            BlockState::Processed | BlockState::Reorged => Ok(self),
        }
    }

    pub fn on_process(self) -> Result<BlockState, IllegalTransition> {
        match self {
            BlockState::Seen => Ok(BlockState::Processed),
            BlockState::Processed => Ok(self),
            _ => Err(IllegalTransition {
                state: self,
                event: "Process",
            }),
        }
    }

    pub fn on_reorg(self) -> Result<BlockState, IllegalTransition> {
        match self {
            BlockState::Reorged => Ok(self),
            _ => Ok(BlockState::Reorged),
        }
    }

    pub fn on_handle_reorg(self) -> Result<BlockState, IllegalTransition> {
        match self {
            BlockState::Reorged => Ok(BlockState::ReorgHandled),
            BlockState::ReorgHandled => Ok(self),
            _ => Err(IllegalTransition {
                state: self,
                event: "HandleReorg",
            }),
        }
    }
}

/// What the Engine remembers about one block number: its lifecycle
/// state and the artifacts the `ServiceEngine` returned for it, so that
/// a later call for the same block can be handed its own prior output.
#[derive(Debug, Clone, Default)]
pub struct BlockMetadata {
    pub state: BlockState,
    pub artifacts: Vec<Artifact>,
}

/// The Engine's counterpart to the Poller's `Tracker`: an ordered map
/// from block number to `BlockMetadata`, pruned the same way.
#[derive(Debug, Clone, Default)]
pub struct MetadataTracker {
    blocks: OrderedMap<BlockMetadata>,
}

impl MetadataTracker {
    pub fn new() -> Self {
        Self {
            blocks: OrderedMap::new(),
        }
    }

    pub fn state(&self, number: u64) -> BlockState {
        self.blocks.get(number).map(|m| m.state).unwrap_or_default()
    }

    pub fn artifacts(&self, number: u64) -> &[Artifact] {
        self.blocks
            .get(number)
            .map(|m| m.artifacts.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_artifacts(&mut self, number: u64, artifacts: Vec<Artifact>) {
        let entry = self.entry(number);
        entry.artifacts = artifacts;
    }

    fn entry(&mut self, number: u64) -> &mut BlockMetadata {
        if self.blocks.get(number).is_none() {
            self.blocks.insert(number, BlockMetadata::default());
        }
        self.blocks.get_mut(number).expect("just inserted")
    }

    pub fn transition(
        &mut self,
        number: u64,
        event: impl FnOnce(BlockState) -> Result<BlockState, IllegalTransition>,
    ) -> Result<BlockState, IllegalTransition> {
        let entry = self.entry(number);
        let next = event(entry.state)?;
        entry.state = next;
        Ok(next)
    }

    pub fn clear_until(&mut self, number: u64) {
        let removed = self.blocks.clear_until(number);
        if removed > 0 {
            tracing::debug!(until = number, removed, "metadata tracker pruned");
        }
    }
}
