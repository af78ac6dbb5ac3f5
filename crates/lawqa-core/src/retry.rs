//! Bounded retry at external-call boundaries.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },
    /// The error was not retryable; no further attempts were made.
    #[error(transparent)]
    Aborted(E),
}

impl<E: std::error::Error + 'static> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted(e) => e,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// `{max_attempts, base_delay, retryable}` applied uniformly to external calls.
///
/// The delay before attempt `n + 1` is `base_delay * n`.
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub base_delay: Duration,
    retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<E: std::error::Error + 'static> RetryPolicy<E> {
    pub fn new(max_attempts: u32, base_delay: Duration, retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retryable,
        }
    }

    /// A single attempt, never retried.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, |_| false)
    }

    pub fn is_retryable(&self, err: &E) -> bool {
        (self.retryable)(err)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if !(self.retryable)(&e) => return Err(RetryError::Aborted(e)),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!(what, attempt, max = self.max_attempts, error = %e, "retrying");
                    tokio::time::sleep(self.base_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
