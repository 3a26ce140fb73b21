use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use tokio_util::sync::CancellationToken;

use evmwatch_common::types::{Header, Log, LogFilter};

use crate::client::{ChainClient, ChainClientError};

/// Per-request deadline applied on top of whatever timeout the
/// transport itself is configured with. A hung RPC call should surface
/// as a retryable `ChainClientError`, not block the Poller forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A `ChainClient` backed by a live `alloy` HTTP provider.
pub struct AlloyChainClient<P: Provider> {
    provider: P,
}

impl AlloyChainClient<alloy::providers::RootProvider> {
    /// Connects to `node_url` over HTTP.
    pub fn connect(node_url: &str) -> Result<Self, ChainClientError> {
        let url = node_url
            .parse()
            .map_err(|e| ChainClientError::Transport(format!("invalid node url: {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).root().clone();
        Ok(Self { provider })
    }
}

impl<P: Provider> AlloyChainClient<P> {
    pub fn from_provider(provider: P) -> Self {
        Self { provider }
    }

    fn build_filter(filter: &LogFilter, from_block: u64, to_block: u64) -> Filter {
        let mut built = Filter::new().from_block(from_block).to_block(to_block);

        if !filter.addresses.is_empty() {
            built = built.address(filter.addresses.clone());
        }

        for (position, topic_set) in filter.topics.iter().enumerate() {
            if topic_set.is_empty() {
                continue;
            }
            built = match position {
                0 => built.event_signature(topic_set.clone()),
                1 => built.topic1(topic_set.clone()),
                2 => built.topic2(topic_set.clone()),
                3 => built.topic3(topic_set.clone()),
                _ => built,
            };
        }

        built
    }

    /// Races `fut` against both the fixed request deadline and `ctx`,
    /// so a cancelled watcher doesn't wait out a hung RPC call.
    async fn timeout<T>(
        ctx: &CancellationToken,
        fut: impl std::future::Future<Output = Result<T, ChainClientError>>,
        on_timeout: ChainClientError,
    ) -> Result<T, ChainClientError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(ChainClientError::Cancelled),
            result = tokio::time::timeout(REQUEST_TIMEOUT, fut) => result.unwrap_or(Err(on_timeout)),
        }
    }
}

#[async_trait::async_trait]
impl<P: Provider + Send + Sync> ChainClient for AlloyChainClient<P> {
    async fn block_number(&self, ctx: &CancellationToken) -> Result<u64, ChainClientError> {
        Self::timeout(
            ctx,
            async {
                self.provider
                    .get_block_number()
                    .await
                    .map_err(|e| ChainClientError::Transport(e.to_string()))
            },
            ChainClientError::Timeout(0),
        )
        .await
    }

    async fn filter_logs(
        &self,
        ctx: &CancellationToken,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainClientError> {
        let built = Self::build_filter(filter, from_block, to_block);

        let logs = Self::timeout(
            ctx,
            async {
                self.provider
                    .get_logs(&built)
                    .await
                    .map_err(|e| ChainClientError::Transport(e.to_string()))
            },
            ChainClientError::Timeout(from_block),
        )
        .await?;

        Ok(logs
            .into_iter()
            .map(|log| Log {
                block_number: log.block_number.unwrap_or(from_block),
                block_hash: log.block_hash.unwrap_or_default(),
                tx_hash: log.transaction_hash.unwrap_or_default(),
                log_index: log.log_index.unwrap_or_default(),
                topics: log.topics().to_vec(),
                address: log.address(),
                data: log.data().data.to_vec(),
            })
            .collect())
    }

    async fn header_by_number(&self, ctx: &CancellationToken, number: u64) -> Result<Header, ChainClientError> {
        let block = Self::timeout(
            ctx,
            async {
                self.provider
                    .get_block_by_number(number.into())
                    .await
                    .map_err(|e| ChainClientError::Transport(e.to_string()))
            },
            ChainClientError::Timeout(number),
        )
        .await?
        .ok_or(ChainClientError::BlockNotFound(number))?;

        let header = block.header;
        let nonce = header.nonce.0;

        Ok(Header {
            number: header.number,
            hash: header.hash,
            nonce,
            timestamp: header.timestamp,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
        })
    }
}
