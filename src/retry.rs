use std::future::Future;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Delay multiplied by `factor` after each failed attempt, capped at `max`.
    Exponential { factor: u32, max: Duration },
}

/// Bounded retry: a fixed number of attempts, never an outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before the first attempt (container settle period).
    pub initial_delay: Duration,
    pub delay: Duration,
    pub backoff: Backoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub attempt_count: u32,
    pub succeeded: bool,
    pub last_error: Option<String>,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max } => {
                let mut d = self.delay;
                for _ in 1..attempt {
                    d = d.saturating_mul(factor);
                    if d >= max {
                        return max;
                    }
                }
                d.min(max)
            }
        }
    }

    /// Run `attempt_fn` until it succeeds or the attempts are exhausted.
    pub async fn run<F, Fut>(&self, what: &str, mut attempt_fn: F) -> HealthCheckResult
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        if !self.initial_delay.is_zero() {
            tokio::time::sleep(self.initial_delay).await;
        }

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            debug!("{} attempt {}/{}", what, attempt, self.max_attempts);

            match attempt_fn(attempt).await {
                Ok(()) => {
                    return HealthCheckResult {
                        attempt_count: attempt,
                        succeeded: true,
                        last_error,
                    }
                }
                Err(e) => {
                    debug!("{} attempt {} failed: {}", what, attempt, e);
                    last_error = Some(e);
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay_after(attempt)).await;
            }
        }

        HealthCheckResult {
            attempt_count: self.max_attempts,
            succeeded: false,
            last_error,
        }
    }
}
