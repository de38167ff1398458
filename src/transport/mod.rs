//! # Transport abstraction.
//!
//! A [`Transport`] is the narrow interface the receiver calls into: one-time setup,
//! batch fetches, and synchronous teardown. Connection handling, framing,
//! credentials and deserialization all live behind it.
//!
//! ## Call sequence per start/stop cycle
//! ```text
//! Receiver::start ──► create_receiver()          (once; error aborts start)
//! WorkerLoop      ──► fetch_batch(n, cancel)     (repeatedly; may be abandoned)
//! Receiver::stop  ──► cancel.cancel()
//!                 ──► stop_receiver()            (once, synchronous)
//!                 ──► await worker loop
//! ```
//!
//! [`MemoryTransport`] is an in-process implementation for tests and demos.

mod memory;

pub use memory::MemoryTransport;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Source of message batches for a receiver.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opaque message type handed to the handler.
    type Message: Send + 'static;

    /// Receiver type identifier used in diagnostics (e.g. `"queue"`, `"topic"`).
    fn kind(&self) -> &str;

    /// Sets up the underlying receiver. Called once per start.
    async fn create_receiver(&self) -> Result<(), TransportError>;

    /// Fetches up to `max` messages.
    ///
    /// May return fewer, including none. `cancel` fires when the receiver stops;
    /// honoring it is optional, since the caller abandons the fetch either way and
    /// any messages it would have returned are dropped.
    async fn fetch_batch(
        &self,
        max: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<Self::Message>, TransportError>;

    /// Tears down the underlying receiver. Called once per stop, after
    /// cancellation and before the worker loop is awaited.
    fn stop_receiver(&self);
}
