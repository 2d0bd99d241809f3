//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter. Only startup
//! connections are retried; status writes rely on the webhook fallback
//! instead of local retries.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for storage connection retries at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::Retryable;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_connection_backoff_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> = (|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {} failed", n))
            } else {
                Ok(n)
            }
        })
        .retry(
            connection_backoff()
                .with_min_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2)),
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
