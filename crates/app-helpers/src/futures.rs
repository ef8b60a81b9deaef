use std::time::Duration;

pub use tryhard;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Retry an async operation up to `max_attempts` times in total.
///
/// The n-th retry waits `n * base_delay` before running.
/// The last error is returned once all attempts are exhausted.
pub fn retry_fn<F, Fut, T, E>(
    max_attempts: u32,
    base_delay: Duration,
    f: F,
) -> tryhard::RetryFuture<F, Fut, tryhard::backoff_strategies::LinearBackoff, tryhard::NoOnRetry>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    tryhard::retry_fn(f)
        .retries(max_attempts.saturating_sub(1))
        .linear_backoff(base_delay)
        .max_delay(MAX_RETRY_DELAY)
}
