//! Bounded retry for reads racing a write that was just made.
//!
//! Only the create path uses this. A steady-state read that comes back
//! not-found means the resource is gone, and retrying would only hide that.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use tokio::time::Instant;

/// Outcome of [`retry_within`].
#[derive(Debug)]
pub enum Retried<T, E> {
    /// The read succeeded.
    Settled { value: T, attempts: u32 },
    /// Every attempt failed transiently and the budget ran out. Carries the
    /// last error.
    Exhausted { error: E, attempts: u32 },
    /// An attempt failed with an error outside the transient whitelist.
    Rejected { error: E, attempts: u32 },
}

impl<T, E> Retried<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Settled { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Settled { value, .. } => Ok(value),
            Self::Exhausted { error, .. } | Self::Rejected { error, .. } => Err(error),
        }
    }
}

/// Delays between read-after-write attempts: 100ms doubling to 5s, with
/// jitter. Unlimited attempts; the time budget is what stops it.
pub fn read_after_write_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_factor(2.0)
        .with_max_times(usize::MAX)
        .with_jitter()
}

/// Run `op` until it succeeds, fails with an error `is_transient` rejects,
/// or `budget` of wall-clock time has elapsed.
///
/// Sleeps never overshoot the budget; the last attempt happens at the
/// deadline at the latest.
pub async fn retry_within<T, E, F, Fut, P>(
    budget: Duration,
    policy: ExponentialBuilder,
    mut op: F,
    mut is_transient: P,
) -> Retried<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    let deadline = Instant::now() + budget;
    let mut delays = policy.build();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let error = match op().await {
            Ok(value) => return Retried::Settled { value, attempts },
            Err(error) => error,
        };
        if !is_transient(&error) {
            return Retried::Rejected { error, attempts };
        }

        let now = Instant::now();
        let Some(delay) = delays.next().filter(|_| now < deadline) else {
            return Retried::Exhausted { error, attempts };
        };
        let delay = delay.min(deadline - now);
        tracing::debug!(attempt = attempts, ?delay, "read not settled yet, retrying");
        tokio::time::sleep(delay).await;
    }
}
