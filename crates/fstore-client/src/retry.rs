//! Retry logic with exponential backoff for store HTTP calls.
//!
//! Retries only on transport errors (connection failures, timeouts).
//! Responses of any status are returned to the caller as-is.

use std::time::Duration;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// Longest single backoff.
const MAX_DELAY_MS: u64 = 5_000;

/// Send an HTTP request, retrying transport failures up to `max_retries`
/// times with exponential backoff.
///
/// The closure `f` is called at most `max_retries + 1` times and must build
/// a fresh request each call.
pub(crate) async fn retry_send<F, Fut>(max_retries: u32, f: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = backoff(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    "store request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    // Final attempt, no more retries.
    f().await
}

fn backoff(attempt: u32) -> Duration {
    let ms = BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(MAX_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    async fn closed_port_attempts(max_retries: u32) -> u32 {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let result = retry_send(max_retries, || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                // Request to a guaranteed-closed port → connection refused.
                reqwest::Client::builder()
                    .timeout(Duration::from_millis(50))
                    .build()
                    .unwrap()
                    .get("http://127.0.0.1:1/")
                    .send()
                    .await
            }
        })
        .await;

        assert!(result.is_err(), "request to closed port must fail");
        call_count.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn retry_exhausts_all_attempts_on_transport_failure() {
        assert_eq!(closed_port_attempts(2).await, 3);
    }

    #[tokio::test]
    async fn zero_retries_makes_one_attempt() {
        assert_eq!(closed_port_attempts(0).await, 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_millis(200));
        assert_eq!(backoff(1), Duration::from_millis(400));
        assert_eq!(backoff(2), Duration::from_millis(800));
        assert_eq!(backoff(20), Duration::from_millis(MAX_DELAY_MS));
    }
}
