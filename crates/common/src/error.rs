use thiserror::Error;

use crate::types::PollerResult;

/// Errors surfaced by a single `Poller::poll` call.
///
/// `FetchLogs` and `FetchHeader` are retried internally by the Poller
/// (see [`crate::retry::retry_with_backoff`]) and only ever reach the
/// caller after retry exhaustion. `FromBlockReorged` is a sentinel: it
/// always carries the partial `PollerResult` that was otherwise
/// successfully assembled, so the Emitter can still forward it before
/// widening its window.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("failed to fetch logs for range [{from_block}, {to_block}]: {source_msg}")]
    FetchLogs {
        from_block: u64,
        to_block: u64,
        source_msg: String,
    },

    #[error("failed to fetch header for block {block_number}: {source_msg}")]
    FetchHeader { block_number: u64, source_msg: String },

    #[error(
        "fetch mismatch at block {block_number}: header hash disagrees with the logs' block_hash"
    )]
    FetchMismatch { block_number: u64 },

    #[error("from_block {from_block} was reorged")]
    FromBlockReorged {
        from_block: u64,
        result: Box<PollerResult>,
    },

    #[error("tracker/result inconsistency at block {block_number}: {reason}")]
    ProcessReorg { block_number: u64, reason: String },

    #[error("invalid policy configuration: {0}")]
    BadPolicy(String),

    /// Raised when the `Expensive` policy's concurrent logs/headers
    /// fetch fails on more than one side; carries every failure rather
    /// than just the first.
    #[error("{} concurrent fetch failures: {}", .0.len(), join_errors(.0))]
    FetchFailed(Vec<PollerError>),
}

fn join_errors(errors: &[PollerError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PollerError {
    /// Extracts the partial result carried by a `FromBlockReorged`
    /// sentinel, if this is one.
    pub fn partial_result(&self) -> Option<&PollerResult> {
        match self {
            PollerError::FromBlockReorged { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Top-level error type for the Emitter/Engine rendezvous and the
/// external collaborators they depend on.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Poller(#[from] PollerError),

    #[error("chain client error: {0}")]
    ChainClient(String),

    #[error("state store error: {0}")]
    StateStore(String),

    #[error("emitter shut down: {0}")]
    EmitterShutdown(String),

    #[error("service engine error: {0}")]
    ServiceError(String),

    #[error("configuration error: {0}")]
    Config(String),
}
