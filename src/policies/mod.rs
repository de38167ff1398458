//! Delay policies for the worker loop.
//!
//! When a fetch fails the worker loop waits before asking the transport again,
//! so a broken connection does not turn into a hot retry loop.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the delay evolves over consecutive failures (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy so many receivers do not retry in lockstep
//!
//! ## Quick wiring
//! ```text
//! ReceiverConfig { fetch_backoff: Option<BackoffPolicy>, .. }
//!      └─► core::worker::WorkerLoop uses:
//!           - fetch_backoff.next(consecutive_failures - 1) after a failed fetch
//!           - no delay after a successful or empty fetch
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `JitterPolicy::None` by default; consider `Equal` when many receivers share a broker.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
