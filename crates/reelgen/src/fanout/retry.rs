//! Finite, escalating retry schedule with cancellable waits.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;

/// Waits between attempts: `delays[n]` is slept after attempt `n + 1` fails.
/// An operation gets `delays.len() + 1` attempts in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryExhausted<E> {
    Failed { attempts: usize, error: E },
    Cancelled,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// `first_delay_ms`, then `step_delay_ms * i` for `i` in `1..=escalations`.
    pub fn from_config(config: &RetryConfig) -> Self {
        let first = Duration::from_millis(config.first_delay_ms);
        let escalating = (1..=u64::from(config.escalations))
            .map(|i| Duration::from_millis(config.step_delay_ms.saturating_mul(i)));
        Self {
            delays: std::iter::once(first).chain(escalating).collect(),
        }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Worst-case time spent sleeping before giving up.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }

    fn delay_after(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt.checked_sub(1)?).copied()
    }

    /// Runs `op` until it succeeds, the schedule runs out, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number. `on_retry` is called with the
    /// failed attempt, its error and the upcoming wait.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        mut on_retry: R,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(usize, &E, Duration),
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryExhausted::Cancelled);
            }
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            let Some(delay) = self.delay_after(attempt) else {
                return Err(RetryExhausted::Failed {
                    attempts: attempt,
                    error,
                });
            };
            on_retry(attempt, &error, delay);
            tokio::select! {
                _ = cancel.cancelled() => return Err(RetryExhausted::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
