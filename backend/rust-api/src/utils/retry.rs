use std::time::Duration;

/// Exponential backoff with jitter for transient infrastructure failures
/// (MongoDB writes, Redis commands). Not used for score reconciliation,
/// which is a single deterministic step.
#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// More persistent profile for writes that must not be lost (score
    /// records, recovery backups).
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 7,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    pub async fn run<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempts_left = self.max_attempts;
        let mut backoff = self.base_backoff;

        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempts_left = attempts_left.saturating_sub(1);
                    if attempts_left == 0 {
                        return Err(e);
                    }

                    let jitter = match self.jitter_max {
                        Some(max) if max.as_millis() > 0 => {
                            Duration::from_millis(rand::random::<u64>() % (max.as_millis() as u64 + 1))
                        }
                        _ => Duration::ZERO,
                    };
                    tokio::time::sleep(backoff + jitter).await;

                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}
