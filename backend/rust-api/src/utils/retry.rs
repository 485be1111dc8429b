use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Backoff for calls to the hosted completion endpoint: few attempts,
    /// long waits, since the endpoint is slow to recover from overload.
    pub fn completion() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    /// Wait before the retry following failed attempt number `attempt` (1-based),
    /// jitter excluded.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    fn jitter(&self) -> Duration {
        match self.jitter_max {
            Some(max) if !max.is_zero() => {
                let max_ms = max.as_millis() as u64;
                Duration::from_millis(rand::random::<u64>() % (max_ms + 1))
            }
            _ => Duration::ZERO,
        }
    }
}

/// Runs `f` until it succeeds or `max_attempts` is exhausted, returning the
/// last error.
pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= config.max_attempts.max(1) => return Err(e),
            Err(e) => {
                let wait = config.backoff_for(attempt) + config.jitter();
                tracing::debug!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    config.max_attempts,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
