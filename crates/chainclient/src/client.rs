use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use evmwatch_common::types::{Header, Log, LogFilter};

/// Errors a `ChainClient` implementation can surface. The Poller treats
/// every variant as transient and retries internally; none of them are
/// classified as reorgs by themselves.
#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("request for block {0} timed out")]
    Timeout(u64),

    #[error("request cancelled")]
    Cancelled,
}

/// The minimal view of a node the Poller depends on. Every method
/// fetches a single, explicit piece of state — there is no streaming or
/// subscription surface here, only point-in-time reads the Poller can
/// retry and re-issue on its own schedule.
///
/// Every method takes `ctx` so a caller can abandon an in-flight RPC
/// call at any suspension point instead of only between calls.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The chain's current head block number.
    async fn block_number(&self, ctx: &CancellationToken) -> Result<u64, ChainClientError>;

    /// Logs matching `filter` in the inclusive range `[from_block,
    /// to_block]`.
    async fn filter_logs(
        &self,
        ctx: &CancellationToken,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainClientError>;

    /// The header at `number`. Errors with `BlockNotFound` if the node
    /// does not (yet, or any longer) have that block.
    async fn header_by_number(&self, ctx: &CancellationToken, number: u64) -> Result<Header, ChainClientError>;
}
