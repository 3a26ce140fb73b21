use std::sync::Arc;

use evmwatch_common::error::WatcherError;
use evmwatch_common::types::{Block, PollerResult};
use evmwatch_statestore::StateStore;

use crate::channels::EngineHandle;
use crate::metadata_tracker::{BlockState, MetadataTracker};
use crate::service::ServiceEngine;

/// Consumes `PollerResult`s, runs the per-block state machine, dispatches
/// to a `ServiceEngine`, persists the watermark, and signals the
/// Emitter to advance.
pub struct Engine {
    handle: EngineHandle,
    service: Arc<dyn ServiceEngine>,
    state_store: Arc<dyn StateStore>,
    metadata: MetadataTracker,
    filter_range: u64,
    look_back_retries: u64,
}

impl Engine {
    pub fn new(
        handle: EngineHandle,
        service: Arc<dyn ServiceEngine>,
        state_store: Arc<dyn StateStore>,
        filter_range: u64,
        look_back_retries: u64,
    ) -> Self {
        Self {
            handle,
            service,
            state_store,
            metadata: MetadataTracker::new(),
            filter_range,
            look_back_retries,
        }
    }

    pub async fn run(mut self) -> Result<(), WatcherError> {
        let mut error_channel_open = true;

        loop {
            tokio::select! {
                maybe_result = self.handle.result_rx.recv() => {
                    match maybe_result {
                        Some(result) => {
                            if let Err(fatal) = self.handle_results(result).await {
                                return Err(fatal);
                            }
                            if self.handle.sync_tx.send(()).await.is_err() {
                                tracing::info!("engine: sync channel closed, shutting down");
                                return Ok(());
                            }
                        }
                        None => {
                            tracing::info!("engine: result channel closed, shutting down");
                            return Ok(());
                        }
                    }
                }
                maybe_err = self.handle.error_rx.recv(), if error_channel_open => {
                    match maybe_err {
                        Some(err) => {
                            if let Err(fatal) = self.service.handle_emitter_error(&err).await {
                                return Err(fatal);
                            }
                        }
                        None => {
                            error_channel_open = false;
                        }
                    }
                }
            }
        }
    }

    async fn handle_results(&mut self, result: PollerResult) -> Result<(), WatcherError> {
        for block in &result.reorged_blocks {
            if !self.handle_reorged_block(block).await? {
                return Ok(());
            }
        }

        for block in &result.good_blocks {
            if !self.handle_good_block(block).await? {
                return Ok(());
            }
        }

        let until = result
            .last_good_block
            .saturating_sub(self.filter_range * self.look_back_retries);
        self.metadata.clear_until(until);

        self.state_store
            .set_last_recorded_block(result.last_good_block)
            .await
            .map_err(|e| WatcherError::StateStore(e.to_string()))?;

        Ok(())
    }

    /// Reorg compensation is at-least-once by design: re-firing `Reorg`
    /// on an already-`Reorged` block still calls `handle_reorged_logs`
    /// again, which matters when a prior call failed before the
    /// matching `HandleReorg`.
    ///
    /// Returns `Ok(false)` when a `ServiceError` was recovered by
    /// `handle_emitter_error`, signaling the caller to abort the rest
    /// of this iteration without treating it as fatal.
    async fn handle_reorged_block(&mut self, block: &Block) -> Result<bool, WatcherError> {
        let post = self
            .metadata
            .transition(block.number, BlockState::on_reorg)
            .expect("on_reorg never fails");

        if post != BlockState::Reorged {
            return Ok(true);
        }

        let prior = self.metadata.artifacts(block.number).to_vec();
        let produced = match self.service.handle_reorged_logs(&block.logs, &prior).await {
            Ok(produced) => produced,
            Err(e) => return self.recover_from_service_error(e).await.map(|()| false),
        };

        self.metadata
            .transition(block.number, BlockState::on_handle_reorg)
            .expect("Reorged -> ReorgHandled always legal here");

        self.metadata
            .set_artifacts(block.number, produced.into_values().flatten().collect());

        Ok(true)
    }

    async fn handle_good_block(&mut self, block: &Block) -> Result<bool, WatcherError> {
        let post = self
            .metadata
            .transition(block.number, BlockState::on_got_log)
            .expect("on_got_log never fails");

        if post != BlockState::Seen {
            tracing::debug!(block = block.number, state = ?post, "skipping already-processed block");
            return Ok(true);
        }

        let prior = self.metadata.artifacts(block.number).to_vec();
        let produced = match self.service.handle_good_logs(&block.logs, &prior).await {
            Ok(produced) => produced,
            Err(e) => return self.recover_from_service_error(e).await.map(|()| false),
        };

        self.metadata
            .transition(block.number, BlockState::on_process)
            .expect("Seen -> Processed always legal here");

        self.metadata
            .set_artifacts(block.number, produced.into_values().flatten().collect());

        Ok(true)
    }

    /// Routes a failed `service.handle_good_logs`/`handle_reorged_logs`
    /// call through `handle_emitter_error` for recovery, per the
    /// `ServiceError` entry in the error taxonomy. Only propagates if
    /// the recovery attempt itself fails.
    async fn recover_from_service_error(&self, cause: WatcherError) -> Result<(), WatcherError> {
        let err = WatcherError::ServiceError(cause.to_string());
        self.service.handle_emitter_error(&err).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use alloy::primitives::{Address, B256};
    use async_trait::async_trait;
    use evmwatch_common::types::Log;
    use evmwatch_statestore::StateStoreError;

    use crate::channels::rendezvous;

    use super::*;

    fn log(number: u64) -> Log {
        Log {
            block_number: number,
            block_hash: B256::from([number as u8; 32]),
            tx_hash: B256::ZERO,
            log_index: 0,
            topics: vec![],
            address: Address::ZERO,
            data: vec![],
        }
    }

    fn block(number: u64) -> Block {
        Block::new(number, B256::from([number as u8; 32]), vec![log(number)])
    }

    struct CountingService {
        good_calls: AtomicUsize,
        reorg_calls: AtomicUsize,
    }

    #[async_trait]
    impl ServiceEngine for CountingService {
        async fn handle_good_logs(
            &self,
            _logs: &[Log],
            _prior: &[evmwatch_common::types::Artifact],
        ) -> Result<HashMap<B256, Vec<evmwatch_common::types::Artifact>>, WatcherError> {
            self.good_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::new())
        }

        async fn handle_reorged_logs(
            &self,
            _logs: &[Log],
            _prior: &[evmwatch_common::types::Artifact],
        ) -> Result<HashMap<B256, Vec<evmwatch_common::types::Artifact>>, WatcherError> {
            self.reorg_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::new())
        }

        async fn handle_emitter_error(&self, _err: &WatcherError) -> Result<(), WatcherError> {
            Ok(())
        }
    }

    struct InMemoryStateStore {
        last: StdMutex<Option<u64>>,
    }

    #[async_trait]
    impl StateStore for InMemoryStateStore {
        async fn get_last_recorded_block(&self) -> Result<Option<u64>, StateStoreError> {
            Ok(*self.last.lock().unwrap())
        }

        async fn set_last_recorded_block(&self, block_number: u64) -> Result<(), StateStoreError> {
            *self.last.lock().unwrap() = Some(block_number);
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), StateStoreError> {
            Ok(())
        }
    }

    fn test_engine(service: Arc<CountingService>) -> Engine {
        let (_emitter_handle, engine_handle) = rendezvous();
        Engine::new(
            engine_handle,
            service,
            Arc::new(InMemoryStateStore {
                last: StdMutex::new(None),
            }),
            10,
            3,
        )
    }

    #[tokio::test]
    async fn good_block_is_processed_exactly_once_across_repeated_results() {
        let service = Arc::new(CountingService {
            good_calls: AtomicUsize::new(0),
            reorg_calls: AtomicUsize::new(0),
        });
        let mut engine = test_engine(service.clone());

        let result = PollerResult {
            from_block: 100,
            to_block: 106,
            last_good_block: 106,
            good_blocks: vec![block(106)],
            reorged_blocks: vec![],
        };
        engine.handle_results(result.clone()).await.unwrap();
        engine.handle_results(result).await.unwrap();

        assert_eq!(service.good_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reorged_block_is_compensated_and_then_fresh_good_logs_applied() {
        let service = Arc::new(CountingService {
            good_calls: AtomicUsize::new(0),
            reorg_calls: AtomicUsize::new(0),
        });
        let mut engine = test_engine(service.clone());

        let result = PollerResult {
            from_block: 100,
            to_block: 105,
            last_good_block: 104,
            good_blocks: vec![block(105)],
            reorged_blocks: vec![block(105)],
        };
        engine.handle_results(result).await.unwrap();

        assert_eq!(service.reorg_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.good_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metadata.state(105), BlockState::Processed);
    }

    /// Two distinct `PollerResult`s can share a block number in
    /// `good_blocks` — e.g. after a `FromBlockReorged` widening, the
    /// Emitter replays a block the prior `PollerResult` also covered.
    /// The per-block state machine must still dispatch to the service
    /// exactly once.
    #[tokio::test]
    async fn good_block_shared_by_two_distinct_poller_results_is_processed_once() {
        let service = Arc::new(CountingService {
            good_calls: AtomicUsize::new(0),
            reorg_calls: AtomicUsize::new(0),
        });
        let mut engine = test_engine(service.clone());

        engine
            .handle_results(PollerResult {
                from_block: 100,
                to_block: 106,
                last_good_block: 106,
                good_blocks: vec![block(106)],
                reorged_blocks: vec![],
            })
            .await
            .unwrap();

        engine
            .handle_results(PollerResult {
                from_block: 103,
                to_block: 108,
                last_good_block: 108,
                good_blocks: vec![block(106), block(107), block(108)],
                reorged_blocks: vec![],
            })
            .await
            .unwrap();

        assert_eq!(service.good_calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.metadata.state(106), BlockState::Processed);
        assert_eq!(engine.metadata.state(108), BlockState::Processed);
    }

    struct FailOnceService {
        failed_once: AtomicUsize,
        good_calls: AtomicUsize,
        recovered: AtomicUsize,
    }

    #[async_trait]
    impl ServiceEngine for FailOnceService {
        async fn handle_good_logs(
            &self,
            _logs: &[Log],
            _prior: &[evmwatch_common::types::Artifact],
        ) -> Result<HashMap<B256, Vec<evmwatch_common::types::Artifact>>, WatcherError> {
            if self.failed_once.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(WatcherError::ChainClient("boom".to_string()));
            }
            self.good_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::new())
        }

        async fn handle_reorged_logs(
            &self,
            _logs: &[Log],
            _prior: &[evmwatch_common::types::Artifact],
        ) -> Result<HashMap<B256, Vec<evmwatch_common::types::Artifact>>, WatcherError> {
            Ok(HashMap::new())
        }

        async fn handle_emitter_error(&self, err: &WatcherError) -> Result<(), WatcherError> {
            assert!(matches!(err, WatcherError::ServiceError(_)));
            self.recovered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// A failed `service.handle_good_logs` call is wrapped as a
    /// `ServiceError` and routed through `handle_emitter_error`. The
    /// Engine survives and does not persist a watermark for the aborted
    /// iteration, but a later, successful result still gets through.
    #[tokio::test]
    async fn failed_service_call_recovers_through_handle_emitter_error_and_aborts_the_iteration() {
        let service = Arc::new(FailOnceService {
            failed_once: AtomicUsize::new(0),
            good_calls: AtomicUsize::new(0),
            recovered: AtomicUsize::new(0),
        });
        let (_emitter_handle, engine_handle) = rendezvous();
        let state_store = Arc::new(InMemoryStateStore {
            last: StdMutex::new(None),
        });
        let mut engine = Engine::new(engine_handle, service.clone(), state_store.clone(), 10, 3);

        engine
            .handle_results(PollerResult {
                from_block: 100,
                to_block: 106,
                last_good_block: 106,
                good_blocks: vec![block(106)],
                reorged_blocks: vec![],
            })
            .await
            .unwrap();

        assert_eq!(service.recovered.load(Ordering::SeqCst), 1);
        assert_eq!(service.good_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state_store.get_last_recorded_block().await.unwrap(), None);
        assert_eq!(engine.metadata.state(106), BlockState::Seen);

        engine
            .handle_results(PollerResult {
                from_block: 100,
                to_block: 106,
                last_good_block: 106,
                good_blocks: vec![block(106)],
                reorged_blocks: vec![],
            })
            .await
            .unwrap();

        assert_eq!(service.good_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state_store.get_last_recorded_block().await.unwrap(), Some(106));
        assert_eq!(engine.metadata.state(106), BlockState::Processed);
    }

    #[tokio::test]
    async fn persisted_watermark_advances_monotonically_across_results() {
        let service = Arc::new(CountingService {
            good_calls: AtomicUsize::new(0),
            reorg_calls: AtomicUsize::new(0),
        });
        let state_store = Arc::new(InMemoryStateStore {
            last: StdMutex::new(None),
        });
        let (_emitter_handle, engine_handle) = rendezvous();
        let mut engine = Engine::new(engine_handle, service, state_store.clone(), 10, 3);

        engine
            .handle_results(PollerResult {
                from_block: 1,
                to_block: 5,
                last_good_block: 5,
                good_blocks: vec![block(5)],
                reorged_blocks: vec![],
            })
            .await
            .unwrap();
        assert_eq!(state_store.get_last_recorded_block().await.unwrap(), Some(5));

        engine
            .handle_results(PollerResult {
                from_block: 6,
                to_block: 10,
                last_good_block: 10,
                good_blocks: vec![block(10)],
                reorged_blocks: vec![],
            })
            .await
            .unwrap();
        assert_eq!(state_store.get_last_recorded_block().await.unwrap(), Some(10));
    }
}
