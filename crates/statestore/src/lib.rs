//! The `StateStore` seam: durable storage for the single `u64` the
//! Engine needs to survive a restart — the last block it fully
//! processed.

mod redis_store;
mod store;

pub use redis_store::RedisStateStore;
pub use store::{StateStore, StateStoreError};
