mod logging_service;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use evmwatch_chainclient::{AlloyChainClient, ChainClient};
use evmwatch_common::config::WatcherConfig;
use evmwatch_engine::{rendezvous, Emitter, Engine};
use evmwatch_poller::Poller;
use evmwatch_statestore::{RedisStateStore, StateStore};

use logging_service::LoggingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WatcherConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .json()
        .init();

    tracing::info!(chain = %config.chain, node_url = %config.node_url, "evmwatch starting");

    let chain_client: Arc<dyn ChainClient> = Arc::new(
        AlloyChainClient::connect(&config.node_url)
            .map_err(|e| anyhow::anyhow!("failed to connect to {}: {e}", config.node_url))?,
    );

    let redis_url =
        std::env::var("WATCHER_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1".to_string());
    let state_store: Arc<dyn StateStore> = Arc::new(
        RedisStateStore::connect(&redis_url, format!("evmwatch:{}:last_recorded_block", config.chain))
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to redis at {redis_url}: {e}"))?,
    );

    let poller = Arc::new(Poller::new(
        Arc::clone(&chain_client),
        config.filter_range,
        config.policy,
        config.do_reorg,
        config.do_header,
    ));

    let (emitter_handle, engine_handle) = rendezvous();
    let cancel = CancellationToken::new();

    let emitter = Emitter::new(
        Arc::clone(&poller),
        Arc::clone(&chain_client),
        Arc::clone(&state_store),
        emitter_handle,
        cancel.clone(),
        config.start_block,
        config.filter_range,
        config.look_back_blocks,
        Duration::from_secs(config.interval_second),
    );

    let engine = Engine::new(
        engine_handle,
        Arc::new(LoggingService),
        Arc::clone(&state_store),
        config.filter_range,
        config.look_back_retries,
    );

    let emitter_task = tokio::spawn(emitter.run());
    let engine_task = tokio::spawn(engine.run());

    tokio::select! {
        result = emitter_task => {
            match result {
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "emitter exited");
                    cancel.cancel();
                    return Err(e.into());
                }
                Err(e) => {
                    cancel.cancel();
                    return Err(anyhow::anyhow!("emitter task panicked: {e}"));
                }
                Ok(Ok(())) => {}
            }
        }
        result = engine_task => {
            match result {
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "engine exited");
                    cancel.cancel();
                    return Err(e.into());
                }
                Err(e) => {
                    cancel.cancel();
                    return Err(anyhow::anyhow!("engine task panicked: {e}"));
                }
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, cancelling");
            cancel.cancel();
        }
    }

    state_store
        .shutdown()
        .await
        .map_err(|e| anyhow::anyhow!("state store shutdown failed: {e}"))?;

    tracing::info!("evmwatch stopped");
    Ok(())
}
