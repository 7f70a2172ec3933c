//! Delay schedules for [`BackoffRetryPolicy`](crate::BackoffRetryPolicy).
//!
//! `attempt` is the 1-based number of the attempt that just failed, exactly as the retry engine
//! passes it to `RetryPolicy::retry_timeout`. Attempt `0` yields no delay. Computations that would
//! overflow saturate at [`MAX_BACKOFF`].
//!
//! ```rust
//! use std::time::Duration;
//! use apiresponse::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(3), Duration::from_millis(400));
//! assert_eq!(backoff.delay(8), Duration::from_secs(1));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Upper bound for any computed delay (1 hour).
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Invalid backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffError {
    #[error("with_max is only valid for linear or exponential backoff")]
    ConstantDoesNotSupportMax,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant(Duration),
    /// `base * attempt`, optionally capped.
    Linear { base: Duration, max: Option<Duration> },
    /// `base * 2^(attempt - 1)`, optionally capped.
    Exponential { base: Duration, max: Option<Duration> },
}

impl Backoff {
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant(delay)
    }

    pub fn linear(base: Duration) -> Self {
        Backoff::Linear { base, max: None }
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base, max: None }
    }

    /// Cap a growing schedule.
    pub fn with_max(self, cap: Duration) -> Result<Self, BackoffError> {
        match self {
            Backoff::Constant(_) => Err(BackoffError::ConstantDoesNotSupportMax),
            Backoff::Linear { base, .. } | Backoff::Exponential { base, .. } if cap < base => {
                Err(BackoffError::MaxLessThanBase { base, max: cap })
            }
            Backoff::Linear { base, .. } => Ok(Backoff::Linear { base, max: Some(cap) }),
            Backoff::Exponential { base, .. } => Ok(Backoff::Exponential { base, max: Some(cap) }),
        }
    }

    /// Delay to wait after the failed `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let (raw, max) = match *self {
            Backoff::Constant(delay) => (delay, None),
            Backoff::Linear { base, max } => (base.checked_mul(attempt).unwrap_or(MAX_BACKOFF), max),
            Backoff::Exponential { base, max } => {
                let factor = 2u128.saturating_pow(attempt - 1);
                let nanos = base.as_nanos().saturating_mul(factor).min(MAX_BACKOFF.as_nanos());
                (Duration::from_nanos(nanos as u64), max)
            }
        };
        max.map_or(raw, |cap| raw.min(cap)).min(MAX_BACKOFF)
    }
}
