//! Retry with exponential backoff, shared by every layer that talks to the
//! upstream.

use std::time::Duration;

use exn::Exn;
use serde::{Deserialize, Serialize};

use crate::Cancel;

/// What [`RetryPolicy`] needs to know about an error kind.
pub trait Retryable {
    /// Whether another attempt might succeed.
    fn is_retryable(&self) -> bool;

    /// Throttling gets a longer backoff than other transient failures.
    fn is_rate_limited(&self) -> bool {
        false
    }

    /// A wait the upstream asked for explicitly.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// The kind reported when the caller's cancel signal interrupts a retry.
    fn cancelled() -> Self;
}

/// Bounded retries on an exponential curve.
///
/// The wait after failed attempt `n` is `base * factor^(n-1)`, capped at
/// `max_delay`. Rate limiting multiplies that, and an explicit `Retry-After`
/// is honoured when it asks for longer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub rate_limit_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            factor: 2.0,
            max_delay_ms: 30_000,
            rate_limit_multiplier: 3.0,
        }
    }
}

impl RetryPolicy {
    /// A policy with the same curve and a different attempt budget.
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }

    /// Wait after the `attempt`th (1-based) failure.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.base_delay_ms as f64 * self.factor.max(1.0).powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    /// Wait after the `attempt`th failure with `error`.
    pub fn delay_for<E: Retryable>(&self, attempt: u32, error: &E) -> Duration {
        let mut delay = self.delay(attempt);
        if error.is_rate_limited() {
            delay = delay.mul_f64(self.rate_limit_multiplier.max(1.0));
        }
        match error.retry_after() {
            Some(asked) => delay.max(asked),
            None => delay,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or runs out of
    /// attempts. The operation receives the 1-based attempt number. Waits
    /// between attempts are interrupted by `cancel`, which surfaces as the
    /// error kind's [`Retryable::cancelled`].
    pub async fn run<T, E, F>(&self, cancel: &Cancel, mut operation: F) -> Result<T, Exn<E>>
    where
        F: AsyncFnMut(u32) -> Result<T, Exn<E>>,
        E: Retryable + std::error::Error + Send + Sync + 'static,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.fired() {
                return Err(Exn::from(E::cancelled()));
            }
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if attempt >= attempts || !error.is_retryable() {
                return Err(error);
            }
            let delay = self.delay_for(attempt, &*error);
            let reason = (*error).to_string();
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, reason, "retrying after transient failure");
            if !cancel.sleep(delay).await {
                return Err(Exn::from(E::cancelled()));
            }
            attempt += 1;
        }
    }
}
