use std::sync::Arc;
use std::time::Duration;

use evmwatch_chainclient::ChainClient;
use evmwatch_common::error::{PollerError, WatcherError};
use evmwatch_common::types::PollerResult;
use evmwatch_poller::Poller;
use evmwatch_statestore::StateStore;
use tokio_util::sync::CancellationToken;

use crate::channels::EmitterHandle;

/// Drives the Poller on a fixed interval, publishing what it finds and
/// waiting for the Engine's go-ahead before advancing. This is the
/// system's sole back-pressure and ordering primitive: the Emitter
/// never starts iteration `k+1` until the Engine has signaled for
/// iteration `k`.
pub struct Emitter {
    poller: Arc<Poller>,
    chain_client: Arc<dyn ChainClient>,
    state_store: Arc<dyn StateStore>,
    handle: EmitterHandle,
    cancel: CancellationToken,
    start_block: u64,
    filter_range: u64,
    look_back_blocks: u64,
    interval: Duration,
}

impl Emitter {
    pub fn new(
        poller: Arc<Poller>,
        chain_client: Arc<dyn ChainClient>,
        state_store: Arc<dyn StateStore>,
        handle: EmitterHandle,
        cancel: CancellationToken,
        start_block: u64,
        filter_range: u64,
        look_back_blocks: u64,
        interval: Duration,
    ) -> Self {
        Self {
            poller,
            chain_client,
            state_store,
            handle,
            cancel,
            start_block,
            filter_range,
            look_back_blocks,
            interval,
        }
    }

    pub async fn run(mut self) -> Result<(), WatcherError> {
        // Set by a `FromBlockReorged` widening, to override the
        // `StateStore`-derived `from` for exactly the next iteration.
        let mut widened_from: Option<u64> = None;

        loop {
            if self.cancel.is_cancelled() {
                return self.shutdown().await;
            }

            let from = match widened_from.take() {
                Some(from) => from,
                None => match self.state_store.get_last_recorded_block().await {
                    Ok(Some(last)) => last + 1,
                    Ok(None) => self.start_block,
                    Err(e) => {
                        let _ = self
                            .handle
                            .error_tx
                            .send(WatcherError::StateStore(e.to_string()))
                            .await;
                        if self.sleep_or_cancel().await {
                            return self.shutdown().await;
                        }
                        continue;
                    }
                },
            };

            let chain_tip = tokio::select! {
                _ = self.cancel.cancelled() => return self.shutdown().await,
                result = self.chain_client.block_number(&self.cancel) => {
                    result.map_err(|e| WatcherError::ChainClient(e.to_string()))?
                }
            };

            let safe_tip = chain_tip.saturating_sub(self.look_back_blocks);
            let to = (from + self.filter_range - 1).min(safe_tip);

            if to < from {
                tracing::debug!(from, safe_tip, "chain tip has not advanced past the safety lag");
                if self.sleep_or_cancel().await {
                    return self.shutdown().await;
                }
                continue;
            }

            tracing::info!(from, to, "polling window");

            let poll_result = tokio::select! {
                _ = self.cancel.cancelled() => return self.shutdown().await,
                result = self.poller.poll(&self.cancel, from, to) => result,
            };

            match poll_result {
                Ok(result) => {
                    self.publish_and_await_sync(result).await?;
                }
                Err(PollerError::FromBlockReorged { from_block, result }) => {
                    tracing::warn!(from_block, "from_block reorged, widening window");
                    self.publish_and_await_sync(*result).await?;
                    widened_from = Some(from.saturating_sub(self.filter_range).max(self.start_block));
                }
                Err(e) => {
                    let _ = self.handle.error_tx.send(WatcherError::Poller(e)).await;
                    if self.sleep_or_cancel().await {
                        return self.shutdown().await;
                    }
                }
            }

            if self.sleep_or_cancel().await {
                return self.shutdown().await;
            }
        }
    }

    /// Publishes `result` and blocks until the Engine signals that it
    /// has finished processing it (and, in the common case, persisted
    /// its watermark — the next iteration's `from` is then read back
    /// from the `StateStore` rather than tracked locally).
    async fn publish_and_await_sync(&mut self, result: PollerResult) -> Result<(), WatcherError> {
        if self.handle.result_tx.send(result).await.is_err() {
            return Err(WatcherError::EmitterShutdown(
                "result channel closed".to_string(),
            ));
        }

        match self.handle.sync_rx.recv().await {
            Some(()) => Ok(()),
            None => Err(WatcherError::EmitterShutdown("sync channel closed".to_string())),
        }
    }

    /// Sleeps for `interval`, returning `true` if cancellation fired
    /// during the wait.
    async fn sleep_or_cancel(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(self.interval) => false,
        }
    }

    async fn shutdown(self) -> Result<(), WatcherError> {
        tracing::info!("emitter shutting down");
        drop(self.handle.result_tx);
        drop(self.handle.error_tx);
        Err(WatcherError::EmitterShutdown("context cancelled".to_string()))
    }
}
