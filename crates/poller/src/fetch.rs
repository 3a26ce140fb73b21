use std::collections::HashMap;

use evmwatch_chainclient::ChainClient;
use evmwatch_common::error::PollerError;
use evmwatch_common::retry::{retry_with_backoff, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY};
use evmwatch_common::types::{Header, Log, LogFilter, Policy};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

async fn fetch_logs(
    ctx: &CancellationToken,
    client: &dyn ChainClient,
    filter: &LogFilter,
    from: u64,
    to: u64,
) -> Result<Vec<Log>, PollerError> {
    retry_with_backoff(ctx, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, || async {
        client.filter_logs(ctx, filter, from, to).await
    })
    .await
    .map_err(|source| PollerError::FetchLogs {
        from_block: from,
        to_block: to,
        source_msg: source.to_string(),
    })
}

pub(crate) async fn fetch_single_header(
    ctx: &CancellationToken,
    client: &dyn ChainClient,
    number: u64,
) -> Result<Header, PollerError> {
    fetch_header(ctx, client, number).await
}

async fn fetch_header(ctx: &CancellationToken, client: &dyn ChainClient, number: u64) -> Result<Header, PollerError> {
    retry_with_backoff(ctx, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, || async {
        client.header_by_number(ctx, number).await
    })
    .await
    .map_err(|source| PollerError::FetchHeader {
        block_number: number,
        source_msg: source.to_string(),
    })
}

/// Fetches headers for `numbers`, concurrently, surfacing the
/// lowest-numbered failure while logging every other one — the errors
/// all share the same shape (a retry-exhausted `FetchHeader`), so there
/// is nothing a caller gains from carrying more than one.
async fn fetch_headers(
    ctx: &CancellationToken,
    client: &dyn ChainClient,
    numbers: impl Iterator<Item = u64>,
) -> Result<HashMap<u64, Header>, PollerError> {
    let futures = numbers.map(|number| async move { (number, fetch_header(ctx, client, number).await) });
    let results = join_all(futures).await;

    let mut headers = HashMap::new();
    let mut first_error = None;
    for (number, result) in results {
        match result {
            Ok(header) => {
                headers.insert(number, header);
            }
            Err(e) => {
                tracing::error!(block_number = number, error = %e, "header fetch failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(headers),
    }
}

pub(crate) struct FetchOutput {
    pub logs: Vec<Log>,
    pub headers: HashMap<u64, Header>,
}

/// Executes the policy-specific fetch strategy for `[from, to]`.
pub(crate) async fn fetch(
    ctx: &CancellationToken,
    client: &dyn ChainClient,
    filter: &LogFilter,
    from: u64,
    to: u64,
    policy: Policy,
    do_header: bool,
) -> Result<FetchOutput, PollerError> {
    match policy {
        Policy::Expensive => {
            let (logs_result, headers_result) = tokio::join!(
                fetch_logs(ctx, client, filter, from, to),
                fetch_headers(ctx, client, from..=to)
            );

            match (logs_result, headers_result) {
                (Ok(logs), Ok(headers)) => Ok(FetchOutput { logs, headers }),
                (Ok(_), Err(e)) | (Err(e), Ok(_)) => Err(PollerError::FetchFailed(vec![e])),
                (Err(logs_err), Err(headers_err)) => {
                    Err(PollerError::FetchFailed(vec![logs_err, headers_err]))
                }
            }
        }
        Policy::Fast | Policy::Normal => {
            let logs = fetch_logs(ctx, client, filter, from, to).await?;

            let headers = if do_header {
                let numbers: std::collections::BTreeSet<u64> =
                    logs.iter().map(|log| log.block_number).collect();
                fetch_headers(ctx, client, numbers.into_iter()).await?
            } else {
                HashMap::new()
            };

            Ok(FetchOutput { logs, headers })
        }
    }
}
