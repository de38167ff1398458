//! # Backoff policy for failed fetches.
//!
//! [`BackoffPolicy`] controls how long the worker loop pauses after the transport
//! fails to deliver a batch. It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the delay after the first failure;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay after failure `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jittered. The base is derived from the failure count alone, so jitter output
//! never feeds into the next delay.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use msgpump::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(50),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(50));
//! assert_eq!(backoff.next(1), Duration::from_millis(100));
//! // 50ms × 2^10 = 51.2s → capped
//! assert_eq!(backoff.next(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy applied between consecutive failed fetches.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `factor = 1.0` (constant delay);
    /// - `first = 100ms`;
    /// - `max = 30s`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: JitterPolicy::None,
            factor: 1.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay after the given failure (0-indexed).
    ///
    /// The base is `first × factor^failure`, clamped to [`BackoffPolicy::max`]; overflow
    /// and non-finite results clamp to `max` as well.
    pub fn next(&self, failure: u32) -> Duration {
        let exp = i32::try_from(failure).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 {
            Duration::try_from_secs_f64(secs).map_or(self.max, |d| d.min(self.max))
        } else {
            self.max
        };
        self.jitter.apply(base, self.first.min(self.max), self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(factor: f64, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor,
            jitter,
        }
    }

    #[test]
    fn test_default_is_constant() {
        let p = BackoffPolicy::default();
        for failure in 0..5 {
            assert_eq!(p.next(failure), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(2), Duration::from_millis(400));
        assert_eq!(p.next(3), Duration::from_millis(800));
    }

    #[test]
    fn test_first_exceeds_max() {
        let p = BackoffPolicy {
            first: Duration::from_secs(20),
            ..policy(2.0, JitterPolicy::None)
        };
        assert_eq!(p.next(0), Duration::from_secs(10));
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.next(64), Duration::from_secs(10));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_equal_jitter_stays_in_upper_half() {
        let p = policy(2.0, JitterPolicy::Equal);
        for failure in 0..12 {
            let base_ms = (100.0 * 2.0f64.powi(failure as i32)).min(10_000.0);
            let delay = p.next(failure);
            assert!(delay >= Duration::from_millis((base_ms / 2.0) as u64));
            assert!(delay <= Duration::from_millis(base_ms as u64));
        }
    }

    #[test]
    fn test_decorrelated_jitter_respects_floor_and_cap() {
        let p = policy(2.0, JitterPolicy::Decorrelated);
        for _ in 0..100 {
            let delay = p.next(6);
            assert!(delay >= Duration::from_millis(100), "{delay:?} below floor");
            assert!(delay <= Duration::from_secs(10), "{delay:?} above cap");
        }
    }
}
