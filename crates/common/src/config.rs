use serde::{Deserialize, Serialize};

use crate::types::Policy;

/// Global watcher configuration, loaded from environment variables.
///
/// Mirrors the recognized options of the original design: `chain`,
/// `node_url`, `start_block`, `filter_range`, `look_back_blocks`,
/// `look_back_retries`, `interval_second`, `do_reorg`, `do_header`,
/// `policy`, `log_level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Informational tag for the chain being watched.
    pub chain: String,

    /// JSON-RPC endpoint passed through to the `ChainClient` factory.
    pub node_url: String,

    /// Earliest block the Emitter will poll.
    pub start_block: u64,

    /// Window size per poll (blocks); also the Tracker's retention
    /// horizon.
    pub filter_range: u64,

    /// Safety lag behind the chain tip.
    pub look_back_blocks: u64,

    /// Multiplier used by the Engine when pruning its metadata tracker.
    pub look_back_retries: u64,

    /// Delay between poll iterations.
    pub interval_second: u64,

    /// Enable Tracker-based reorg detection.
    pub do_reorg: bool,

    /// Enable header fetching under the `Normal` policy.
    pub do_header: bool,

    pub policy: Policy,

    /// Verbosity passed to the `tracing` env-filter fallback.
    pub log_level: String,
}

impl WatcherConfig {
    /// Load configuration from environment variables, falling back to a
    /// `.env` file via `dotenvy` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            chain: std::env::var("WATCHER_CHAIN").unwrap_or_else(|_| "ethereum".to_string()),
            node_url: std::env::var("WATCHER_NODE_URL")
                .map_err(|_| anyhow::anyhow!("WATCHER_NODE_URL environment variable is required"))?,
            start_block: parse_env("WATCHER_START_BLOCK", 0)?,
            filter_range: parse_env("WATCHER_FILTER_RANGE", 2000)?,
            look_back_blocks: parse_env("WATCHER_LOOK_BACK_BLOCKS", 0)?,
            look_back_retries: parse_env("WATCHER_LOOK_BACK_RETRIES", 3)?,
            interval_second: parse_env("WATCHER_INTERVAL_SECOND", 5)?,
            do_reorg: parse_env("WATCHER_DO_REORG", true)?,
            do_header: parse_env("WATCHER_DO_HEADER", true)?,
            policy: parse_policy(
                std::env::var("WATCHER_POLICY").unwrap_or_else(|_| "normal".to_string()),
            )?,
            log_level: std::env::var("WATCHER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_policy(raw: String) -> anyhow::Result<Policy> {
    match raw.to_ascii_lowercase().as_str() {
        "fast" => Ok(Policy::Fast),
        "normal" | "cheap" => Ok(Policy::Normal),
        "expensive" => Ok(Policy::Expensive),
        other => Err(anyhow::anyhow!("unknown WATCHER_POLICY: {other}")),
    }
}
