use std::collections::HashMap;

use alloy::primitives::B256;
use async_trait::async_trait;
use evmwatch_common::error::WatcherError;
use evmwatch_common::types::{Artifact, Log};

/// The business logic the Engine dispatches to. The core never
/// interprets a `Log`'s payload or an `Artifact`'s shape — both are
/// opaque to everything in this workspace except the implementor.
#[async_trait]
pub trait ServiceEngine: Send + Sync {
    /// Called once per freshly-`Seen` block, with that block's logs and
    /// whatever artifacts a previous call for the same block number
    /// left behind (empty on first sight).
    async fn handle_good_logs(
        &self,
        logs: &[Log],
        prior_artifacts: &[Artifact],
    ) -> Result<HashMap<B256, Vec<Artifact>>, WatcherError>;

    /// Called once per newly-`Reorged` block, with the *old* logs being
    /// compensated.
    async fn handle_reorged_logs(
        &self,
        logs: &[Log],
        prior_artifacts: &[Artifact],
    ) -> Result<HashMap<B256, Vec<Artifact>>, WatcherError>;

    /// Observes an error from the error channel. Returning `Ok(())`
    /// lets the Engine continue; returning `Err` aborts the Engine's
    /// loop.
    async fn handle_emitter_error(&self, err: &WatcherError) -> Result<(), WatcherError>;
}
