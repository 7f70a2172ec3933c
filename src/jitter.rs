//! Randomisation applied on top of a [`Backoff`](crate::Backoff) delay so that clients retrying
//! the same endpoint do not synchronise.
//!
//! - `None`: exact delay; use in tests.
//! - `Full`: uniform in `[0, delay]`.
//! - `Equal`: uniform in `[delay / 2, delay]`.

use rand::{rng, Rng};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Jitter {
    #[default]
    None,
    Full,
    Equal,
}

impl Jitter {
    pub fn full() -> Self {
        Jitter::Full
    }

    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Randomise `delay` with the thread-local RNG.
    pub fn apply(&self, delay: Duration) -> Duration {
        self.apply_with_rng(delay, &mut rng())
    }

    /// Randomise `delay` with a caller-supplied RNG.
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Duration::ZERO;
        }
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rng.random_range(0..=millis)),
            Jitter::Equal => Duration::from_millis(rng.random_range(millis / 2..=millis)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn none_is_identity() {
        assert_eq!(Jitter::None.apply(Duration::from_millis(1234)), Duration::from_millis(1234));
    }

    #[test]
    fn full_stays_within_delay() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(Jitter::full().apply_with_rng(Duration::from_secs(1), &mut rng) <= Duration::from_secs(1));
        }
    }

    #[test]
    fn equal_keeps_half_floor() {
        for _ in 0..100 {
            let d = Jitter::equal().apply(Duration::from_secs(1));
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_secs(1));
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(Jitter::full().apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(Jitter::equal().apply(Duration::ZERO), Duration::ZERO);
    }
}
