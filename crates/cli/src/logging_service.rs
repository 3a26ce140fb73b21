use std::collections::HashMap;

use alloy::primitives::B256;
use async_trait::async_trait;

use evmwatch_common::error::WatcherError;
use evmwatch_common::types::{Artifact, Log};
use evmwatch_engine::ServiceEngine;

/// A `ServiceEngine` that only logs what it's given and carries no
/// artifacts forward. Stands in until a real indexer is wired up to
/// consume `handle_good_logs`/`handle_reorged_logs`.
pub struct LoggingService;

#[async_trait]
impl ServiceEngine for LoggingService {
    async fn handle_good_logs(
        &self,
        logs: &[Log],
        _prior_artifacts: &[Artifact],
    ) -> Result<HashMap<B256, Vec<Artifact>>, WatcherError> {
        for log in logs {
            tracing::info!(
                block = log.block_number,
                tx_hash = %log.tx_hash,
                log_index = log.log_index,
                "good log"
            );
        }
        Ok(HashMap::new())
    }

    async fn handle_reorged_logs(
        &self,
        logs: &[Log],
        _prior_artifacts: &[Artifact],
    ) -> Result<HashMap<B256, Vec<Artifact>>, WatcherError> {
        for log in logs {
            tracing::warn!(
                block = log.block_number,
                tx_hash = %log.tx_hash,
                log_index = log.log_index,
                "compensating reorged log"
            );
        }
        Ok(HashMap::new())
    }

    async fn handle_emitter_error(&self, err: &WatcherError) -> Result<(), WatcherError> {
        tracing::error!(error = %err, "emitter reported an error");
        Ok(())
    }
}
