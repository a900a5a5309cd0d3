//! Exponential backoff for transient product-API failures.
//!
//! Only rate limiting (429) and network-level failures are retried. A 404,
//! an `success: false` envelope or a body that does not parse will fail the
//! same way on every attempt and is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

const MAX_DELAY_SECS: u64 = 60;

fn is_retriable(err: &ClientError) -> bool {
    matches!(err, ClientError::RateLimited { .. } | ClientError::Http(_))
}

/// Runs `operation`, retrying transient errors up to `max_retries` more
/// times. The wait before retry `n` (1-based) is
/// `backoff_base_secs * 2^(n-1)` seconds, capped at one minute, with ±25%
/// jitter. A zero base disables the wait entirely.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay_secs = backoff_base_secs
            .saturating_mul(1u64 << attempt.min(10))
            .min(MAX_DELAY_SECS);
        #[allow(clippy::cast_precision_loss)]
        let delay = Duration::from_secs_f64(delay_secs as f64 * (rand::random::<f64>() * 0.5 + 0.75));
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms = delay.as_millis(),
            error = %err,
            "transient product API error, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn rate_limited() -> ClientError {
        ClientError::RateLimited {
            retry_after_secs: 0,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ClientError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, ClientError>(1)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ClientError>(rate_limited())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ClientError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ClientError>(ClientError::Api("Producto no encontrado".to_owned()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ClientError::Api(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let started = tokio::time::Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 1, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ClientError>(rate_limited())
            }
        })
        .await;
        assert!(result.is_err());
        // 1s then 2s, each scaled by at least 0.75
        assert!(started.elapsed() >= Duration::from_millis(2250));
    }
}
