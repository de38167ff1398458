//! # Jitter for fetch backoff delays.
//!
//! Receivers that lose the same broker at the same moment would otherwise retry in
//! lockstep. [`JitterPolicy`] randomizes each delay inside a window derived from the
//! un-jittered delay and the backoff bounds.

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as computed.
    #[default]
    None,

    /// Anywhere in `[0, delay]`.
    Full,

    /// Anywhere in `[delay/2, delay]`.
    Equal,

    /// Anywhere in `[floor, min(delay × 3, cap)]`, where `floor` is the first backoff
    /// delay and `cap` the policy maximum.
    Decorrelated,
}

impl JitterPolicy {
    /// Jitters `delay` within the window of this policy.
    ///
    /// `floor` and `cap` only matter for [`JitterPolicy::Decorrelated`].
    pub fn apply(&self, delay: Duration, floor: Duration, cap: Duration) -> Duration {
        let (lo, hi) = match self {
            JitterPolicy::None => return delay,
            JitterPolicy::Full => (Duration::ZERO, delay),
            JitterPolicy::Equal => (delay / 2, delay),
            JitterPolicy::Decorrelated => {
                let hi = delay.saturating_mul(3).min(cap);
                (floor.min(hi), hi)
            }
        };
        pick(lo, hi)
    }
}

/// Uniform pick in `[lo, hi]` at millisecond resolution.
fn pick(lo: Duration, hi: Duration) -> Duration {
    let lo_ms = u64::try_from(lo.as_millis()).unwrap_or(u64::MAX);
    let hi_ms = u64::try_from(hi.as_millis()).unwrap_or(u64::MAX);
    if hi_ms <= lo_ms {
        return lo;
    }
    Duration::from_millis(rand::rng().random_range(lo_ms..=hi_ms))
}
