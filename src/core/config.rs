//! # Receiver configuration.
//!
//! Provides [`ReceiverConfig`], the settings a [`Receiver`](crate::Receiver) is built with.
//! The config is captured by [`ReceiverBuilder`](crate::ReceiverBuilder) and is immutable
//! for the receiver's lifetime.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → clamped to 1 (a gate always has at least one permit)
//! - `max_batch = 0` → no cap beyond the gate's available permits
//! - `fetch_timeout = 0s` → no fetch timeout
//! - `fetch_backoff = None` → re-fetch immediately after a fetch failure

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Configuration for a single receiver.
///
/// ## Field semantics
/// - `max_concurrent`: handler concurrency limit, the throttle gate capacity (`0` clamps to 1)
/// - `max_batch`: upper bound on the requested fetch size (`0` = gate-sized only)
/// - `fetch_timeout`: abandon a fetch that runs longer than this (`0s` = never)
/// - `fetch_backoff`: delay policy after consecutive fetch failures (`None` = no delay)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `name`: instance identifier in diagnostics (`None` = `"<kind>-<n>"`)
///
/// ## Notes
/// All fields are public. Prefer the accessors over reading sentinel fields directly.
#[derive(Clone, Debug)]
pub struct ReceiverConfig {
    /// Maximum number of handler invocations in flight at once.
    pub max_concurrent: usize,

    /// Upper bound on the batch size requested from the transport.
    ///
    /// The requested size is otherwise derived from the gate's available permits,
    /// which is a hint and never a contract.
    pub max_batch: usize,

    /// Per-fetch timeout.
    ///
    /// A fetch exceeding it is abandoned and reported as
    /// [`PumpError::FetchTimeout`](crate::PumpError::FetchTimeout).
    pub fetch_timeout: Duration,

    /// Delay policy applied after a failed fetch.
    ///
    /// The attempt number passed to [`BackoffPolicy::next`] is the count of
    /// consecutive failures minus one; it resets on the next successful fetch.
    pub fetch_backoff: Option<BackoffPolicy>,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Instance identifier override.
    pub name: Option<String>,
}

impl ReceiverConfig {
    /// Returns the throttle gate capacity, never less than 1.
    #[inline]
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Returns the batch cap as an `Option`.
    ///
    /// - `None` → sized by available permits only
    /// - `Some(n)` → never request more than `n`
    #[inline]
    pub fn batch_cap(&self) -> Option<usize> {
        if self.max_batch == 0 {
            None
        } else {
            Some(self.max_batch)
        }
    }

    /// Returns the fetch timeout as an `Option`.
    #[inline]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        if self.fetch_timeout == Duration::ZERO {
            None
        } else {
            Some(self.fetch_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ReceiverConfig {
    /// Default configuration:
    ///
    /// - `max_concurrent = 16`
    /// - `max_batch = 0` (gate-sized)
    /// - `fetch_timeout = 0s` (none)
    /// - `fetch_backoff = Some(BackoffPolicy::default())` (constant 100ms, capped at 30s)
    /// - `bus_capacity = 1024`
    /// - `name = None`
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            max_batch: 0,
            fetch_timeout: Duration::ZERO,
            fetch_backoff: Some(BackoffPolicy::default()),
            bus_capacity: 1024,
            name: None,
        }
    }
}
