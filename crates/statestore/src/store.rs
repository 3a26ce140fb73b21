use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state store backend error: {0}")]
    Backend(String),
}

/// Durable home for the watermark the Engine advances after every
/// fully-processed block. The Engine is the only writer; the Emitter
/// only reads it once, at startup, to pick a starting block.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_last_recorded_block(&self) -> Result<Option<u64>, StateStoreError>;

    async fn set_last_recorded_block(&self, block_number: u64) -> Result<(), StateStoreError>;

    /// Releases any held connections. Called once, during graceful
    /// shutdown.
    async fn shutdown(&self) -> Result<(), StateStoreError>;
}
