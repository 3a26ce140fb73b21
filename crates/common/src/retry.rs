use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Retries `f` up to `attempts` times with linear backoff
/// (`base_delay * attempt_number` between attempts), returning the first
/// success or the *last* error once attempts are exhausted.
///
/// Shared by every `ChainClient` call the Poller makes (`filter_logs`,
/// `header_by_number`) so that transient RPC failures don't abort a
/// whole poll. `ctx` is raced against the backoff sleep so a cancelled
/// watcher doesn't sit out the full delay before giving up.
pub async fn retry_with_backoff<T, E, F, Fut>(
    ctx: &CancellationToken,
    attempts: usize,
    base_delay: Duration,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    assert!(attempts >= 1, "retry_with_backoff requires attempts >= 1");

    let mut last_err = None;
    for attempt in 1..=attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < attempts && !ctx.is_cancelled() {
                    tracing::debug!(attempt, attempts, error = %err, "retrying after failure");
                    tokio::select! {
                        _ = ctx.cancelled() => {}
                        _ = tokio::time::sleep(base_delay * attempt as u32) => {}
                    }
                } else {
                    tracing::warn!(attempts, error = %err, "retries exhausted");
                }
                last_err = Some(err);
                if ctx.is_cancelled() {
                    break;
                }
            }
        }
    }

    Err(last_err.expect("loop always runs at least once"))
}

/// Default retry attempts for `ChainClient` calls, per the design.
pub const DEFAULT_RETRY_ATTEMPTS: usize = 10;

/// Default base delay between retry attempts.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_sleeping() {
        let calls = AtomicUsize::new(0);
        let ctx = CancellationToken::new();
        let result: Result<_, &str> = retry_with_backoff(&ctx, 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, &str>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let ctx = CancellationToken::new();
        let result = retry_with_backoff(&ctx, 5, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reports_only_last_error_after_exhaustion() {
        let calls = AtomicUsize::new(0);
        let ctx = CancellationToken::new();
        let result: Result<i32, String> = retry_with_backoff(&ctx, 3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure #{n}")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure #2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying_without_waiting_out_the_backoff() {
        let calls = AtomicUsize::new(0);
        let ctx = CancellationToken::new();
        ctx.cancel();
        let result: Result<i32, &str> = retry_with_backoff(&ctx, 5, Duration::from_secs(30), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("transient") }
        })
        .await;

        assert_eq!(result.unwrap_err(), "transient");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
