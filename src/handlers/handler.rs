//! # Handler trait.
//!
//! A [`Handler`] receives one message per call. Calls for different messages run
//! concurrently (bounded by the receiver's gate), so implementations must be
//! `Send + Sync` and keep any shared state behind their own synchronization.
//!
//! The receiver never cancels a handler once it has started; stop waits for it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;

/// Shared handle to a handler, as accepted by [`Receiver::start`](crate::Receiver::start).
pub type HandlerRef<M> = Arc<dyn Handler<M>>;

/// # Asynchronous message callback.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use msgpump::{Handler, HandlerError};
///
/// struct Printer;
///
/// #[async_trait]
/// impl Handler<String> for Printer {
///     async fn handle(&self, message: String) -> Result<(), HandlerError> {
///         if message.is_empty() {
///             return Err(HandlerError::fail("empty payload"));
///         }
///         println!("{message}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<M>: Send + Sync + 'static {
    /// Processes one message.
    ///
    /// An error is reported as a `HandlerFailed` event; it does not affect other
    /// messages or the receiver. The core does not retry and does not assume
    /// idempotence.
    async fn handle(&self, message: M) -> Result<(), HandlerError>;
}
