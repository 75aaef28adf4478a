//! Fixed-interval polling with a hard attempt ceiling.
//!
//! The delay between attempts is injected so callers can poll against a real
//! clock in production and a recording fake in tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Interval between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Status checks before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Suspends the caller between attempts
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delay on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    /// Upper bound on time spent waiting between attempts
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    /// Every attempt came back pending
    Exhausted { attempts: u32 },
    /// An attempt failed outright
    Check(E),
}

/// Run `check` until it returns [`Attempt::Done`], an error, or the policy's
/// attempt ceiling is reached.
///
/// `check` receives the 1-based attempt number. The delay runs only between
/// attempts, so `max_attempts` pending results cost `max_attempts - 1` delays.
pub async fn poll_until<T, E, F, Fut>(
    policy: PollPolicy,
    delay: &dyn Delay,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    for attempt in 1..=policy.max_attempts {
        match check(attempt).await.map_err(PollError::Check)? {
            Attempt::Done(value) => return Ok(value),
            Attempt::Pending => {
                if attempt < policy.max_attempts {
                    delay.sleep(policy.interval).await;
                }
            }
        }
    }

    Err(PollError::Exhausted {
        attempts: policy.max_attempts,
    })
}
