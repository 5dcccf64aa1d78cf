// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Retry policy for upstream calls (spec §4.4): only HTTP 429 is retried, up
//! to a configured number of attempts, with exponential backoff capped at a
//! maximum and a small amount of jitter so a burst of callers doesn't retry
//! in lockstep.
//!
//! Narrowed from `forge-providers::retry`'s broader retryable-status set
//! (408/409/429/5xx plus an `x-should-retry` header override) down to the
//! single status the upstream actually asks for: a 403/ContextOverflow is a
//! client-correctable error, not a transient one, and every other upstream
//! failure is handled by account rotation rather than retrying on the same
//! credential.

use std::time::Duration;

use chatgate_proto::GatewayError;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first. `retryTimes` in the config file
    /// names the number of *extra* attempts, so this is `retry_times + 1`.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn from_retry_times(retry_times: u32) -> Self {
        Self { max_attempts: retry_times + 1, base_delay: Duration::from_millis(500), max_delay: Duration::from_secs(8) }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_retry_times(3)
    }
}

fn is_rate_limited(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Upstream { status: 429, .. } | GatewayError::RateLimit { .. })
}

/// `base * 2^(attempt-1)`, capped at `max_delay`, with up to 20% jitter
/// added so concurrent retries don't all wake up at once.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
    let capped = exp.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 + rand::random::<f64>() * 0.2;
    Duration::from_secs_f64(capped * jitter).min(config.max_delay)
}

/// Runs `attempt` up to `config.max_attempts` times, retrying only on a
/// rate-limit response. The last error is returned once attempts are
/// exhausted.
pub async fn retry_on_rate_limit<F, Fut, T>(config: &RetryConfig, mut attempt: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, GatewayError>>,
{
    let mut attempt_num = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if is_rate_limited(&err) && attempt_num < config.max_attempts => {
                let delay = backoff_delay(config, attempt_num);
                tracing::debug!(attempt = attempt_num, delay_ms = delay.as_millis(), "retrying after rate limit");
                tokio::time::sleep(delay).await;
                attempt_num += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_retrying_on_success() {
        let config = RetryConfig { max_attempts: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) };
        let calls = AtomicU32::new(0);
        let result: Result<i32, GatewayError> = retry_on_rate_limit(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let config = RetryConfig { max_attempts: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) };
        let calls = AtomicU32::new(0);
        let result: Result<i32, GatewayError> = retry_on_rate_limit(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(GatewayError::Upstream { status: 429, body: "slow down".into() })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_rate_limit_error_is_not_retried() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<i32, GatewayError> = retry_on_rate_limit(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Upstream { status: 403, body: "forbidden".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let config = RetryConfig { max_attempts: 2, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) };
        let calls = AtomicU32::new(0);
        let result: Result<i32, GatewayError> = retry_on_rate_limit(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Upstream { status: 429, body: "still limited".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
