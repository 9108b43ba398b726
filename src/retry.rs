//! Reconnect policy and backoff logic.
//!
//! This module provides the [`ReconnectPolicy`] type and the
//! [`retry_with_backoff`] helper used by the client's connection supervisor
//! to re-open the transport after an unexpected close.
//!
//! # Reconnect Strategy
//!
//! - The default policy retries forever with a fixed 300ms delay
//! - Exponential growth is opt-in via `multiplier` and capped at `max_delay`
//! - Optional ±25% jitter spreads out clients reconnecting at the same time
//! - Each failed attempt is logged with timing information

use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::BuildHasher;
use std::time::Duration;
use tokio::time::sleep;

use crate::{log_debug, log_warn};

/// Reconnect configuration.
///
/// # Example
///
/// ```
/// use ws_rpc::ReconnectPolicy;
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy {
///     max_attempts: Some(10),
///     multiplier: 2.0,
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(5),
///     jitter: true,
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts per outage (`None` = unbounded).
    pub max_attempts: Option<u32>,

    /// Backoff multiplier applied to the delay after each attempt.
    ///
    /// 1.0 keeps the delay fixed; 2.0 doubles it each time.
    pub multiplier: f32,

    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,

    /// Maximum delay between attempts (caps exponential growth).
    pub max_delay: Duration,

    /// Apply ±25% randomization to each delay.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    /// Retry forever, every 300ms.
    fn default() -> Self {
        Self::fixed(Duration::from_millis(300))
    }
}

impl ReconnectPolicy {
    /// Unbounded retries with a constant delay.
    pub fn fixed(delay: Duration) -> Self {
        // ---
        Self {
            max_attempts: None,
            multiplier: 1.0,
            initial_delay: delay,
            max_delay: delay,
            jitter: false,
        }
    }

    /// Unbounded retries with exponential backoff.
    pub fn exponential(initial_delay: Duration, multiplier: f32, max_delay: Duration) -> Self {
        // ---
        Self {
            max_attempts: None,
            multiplier,
            initial_delay,
            max_delay,
            jitter: false,
        }
    }

    /// Give up after `attempts` failed reconnects.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Enable ±25% jitter.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Successive delays for one outage.
    pub(crate) fn backoff(&self) -> Backoff<'_> {
        // ---
        Backoff {
            policy: self,
            attempt: 0,
            current: self.initial_delay,
        }
    }
}

/// Iterator over reconnect delays; ends when attempts are exhausted.
pub(crate) struct Backoff<'a> {
    policy: &'a ReconnectPolicy,
    attempt: u32,
    current: Duration,
}

impl Iterator for Backoff<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        // ---
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        self.attempt += 1;

        let delay = self.current.min(self.policy.max_delay);
        let next = Duration::from_secs_f64(delay.as_secs_f64() * f64::from(self.policy.multiplier));
        self.current = next.min(self.policy.max_delay);

        if self.policy.jitter {
            Some(apply_jitter(delay))
        } else {
            Some(delay)
        }
    }
}

/// Retry an async operation according to a reconnect policy.
///
/// Sleeps before every attempt, including the first: the caller has just
/// observed a failure. Returns `None` once the policy's attempts are
/// exhausted.
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    policy: &ReconnectPolicy,
    mut operation: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let mut delays = policy.backoff();
    let mut attempt = 0u32;

    loop {
        let Some(delay) = delays.next() else {
            log_warn!("reconnect gave up after {attempt} attempts");
            return None;
        };

        attempt += 1;
        log_debug!("reconnect attempt {attempt}, waiting {delay:?}");
        sleep(delay).await;

        match operation().await {
            Ok(value) => return Some(value),
            Err(_err) => {
                log_debug!("reconnect attempt {attempt} failed: {_err}");
            }
        }
    }
}

/// Apply ±25% jitter to a duration to prevent thundering herd.
///
/// Uses a simple multiplicative jitter: `delay * (0.75 + random(0.0..0.5))`
fn apply_jitter(delay: Duration) -> Duration {
    // ---
    let random_state = RandomState::new();
    let hash = random_state.hash_one(std::time::SystemTime::now());

    // Convert to 0.0..1.0 range
    #[allow(clippy::cast_precision_loss)]
    let random_factor = (hash % 1000) as f64 / 1000.0;

    let jitter_multiplier = 0.75 + (random_factor * 0.5);

    Duration::from_secs_f64(delay.as_secs_f64() * jitter_multiplier)
}
