//! # Closure-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(M) -> Fut`, producing a fresh future per
//! message. Shared state goes in an `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use msgpump::{HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef<u64> = HandlerFn::arc(|n: u64| async move {
//!     if n == 0 {
//!         return Err(HandlerError::fail("zero"));
//!     }
//!     Ok(())
//! });
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::handlers::handler::Handler;

/// Closure-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Wraps a closure.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<M, F, Fut> Handler<M> for HandlerFn<F>
where
    M: Send + 'static,
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: M) -> Result<(), HandlerError> {
        (self.f)(message).await
    }
}
