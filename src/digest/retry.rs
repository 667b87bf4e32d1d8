use std::{future::Future, time::Duration};

use tracing::warn;

/// Fixed retry budget applied to each pipeline step.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Linear backoff unit: attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff: Duration::from_secs(2),
        }
    }

    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            backoff: Duration::ZERO,
        }
    }

    pub async fn run<T, F, Fut>(&self, step: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(%step, attempt, error = %e, "step failed; retrying");
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
                Err(e) => {
                    return Err(e.context(format!("{step} failed after {} attempt(s)", attempt + 1)))
                }
            }
        }
    }
}
