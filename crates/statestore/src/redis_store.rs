use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::store::{StateStore, StateStoreError};

/// A `StateStore` backed by Redis, using a single string key holding
/// the decimal block number. `ConnectionManager` transparently
/// reconnects on transport errors, so the store itself stays stateless
/// beyond the key name.
pub struct RedisStateStore {
    conn: ConnectionManager,
    key: String,
}

impl RedisStateStore {
    /// Connects to `redis_url` and tracks the watermark under `key`
    /// (e.g. `"evmwatch:{chain}:last_recorded_block"`).
    pub async fn connect(redis_url: &str, key: impl Into<String>) -> Result<Self, StateStoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StateStoreError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StateStoreError::Backend(e.to_string()))?;

        Ok(Self {
            conn,
            key: key.into(),
        })
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get_last_recorded_block(&self) -> Result<Option<u64>, StateStoreError> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn
            .get(&self.key)
            .await
            .map_err(|e| StateStoreError::Backend(e.to_string()))?;
        Ok(value)
    }

    async fn set_last_recorded_block(&self, block_number: u64) -> Result<(), StateStoreError> {
        let mut conn = self.conn.clone();
        conn.set(&self.key, block_number)
            .await
            .map_err(|e| StateStoreError::Backend(e.to_string()))
    }

    async fn shutdown(&self) -> Result<(), StateStoreError> {
        // ConnectionManager has no explicit close; dropping it closes
        // the underlying transport.
        Ok(())
    }
}
