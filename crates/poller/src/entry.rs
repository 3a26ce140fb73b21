use alloy::primitives::B256;

use evmwatch_common::types::Log;

/// One block's collated view during a single `poll`, before the
/// admission/retention rules decide what happens to the Tracker.
#[derive(Debug, Clone)]
pub(crate) struct PollEntry {
    pub hash: B256,
    pub logs: Vec<Log>,
    pub forked: bool,
    pub logs_migrated: bool,
}

impl PollEntry {
    pub fn from_logs(hash: B256, logs: Vec<Log>) -> Self {
        Self {
            hash,
            logs,
            forked: false,
            logs_migrated: false,
        }
    }

    pub fn empty(hash: B256) -> Self {
        Self {
            hash,
            logs: Vec::new(),
            forked: false,
            logs_migrated: false,
        }
    }

    /// A previously-tracked block that no longer appears in this poll's
    /// result map — its logs migrated elsewhere or disappeared.
    pub fn rescued(hash: B256) -> Self {
        Self {
            hash,
            logs: Vec::new(),
            forked: false,
            logs_migrated: true,
        }
    }
}
