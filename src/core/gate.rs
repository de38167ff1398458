//! # Throttle gate: bounds concurrently running handlers.
//!
//! A thin wrapper over [`tokio::sync::Semaphore`] with one permit per allowed
//! handler. The permit is an RAII guard, so it returns to the gate on every exit
//! path of a dispatch unit, including handler errors and panics.
//!
//! The gate lives as long as the receiver and is shared by every start/stop cycle,
//! so the bound holds across the receiver's entire lifetime.

use std::sync::Arc;

use tokio::select;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;

use crate::error::PumpError;

/// Held for the duration of one handler invocation.
pub(crate) type GatePermit = OwnedSemaphorePermit;

/// Counting gate sized by `ReceiverConfig::max_concurrent`.
#[derive(Clone, Debug)]
pub(crate) struct ThrottleGate {
    sem: Arc<Semaphore>,
    capacity: usize,
}

impl ThrottleGate {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a permit.
    ///
    /// Returns [`PumpError::Canceled`] if `token` fires first or the gate is closed.
    pub(crate) async fn acquire(&self, token: &CancellationToken) -> Result<GatePermit, PumpError> {
        if token.is_cancelled() {
            return Err(PumpError::Canceled);
        }
        select! {
            biased;
            _ = token.cancelled() => Err(PumpError::Canceled),
            res = Arc::clone(&self.sem).acquire_owned() => res.map_err(|_closed| PumpError::Canceled),
        }
    }

    /// Takes a permit only if one is free right now.
    pub(crate) fn try_acquire(&self) -> Option<GatePermit> {
        match Arc::clone(&self.sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    /// Permits free at this instant. A sizing hint; stale as soon as it is read.
    #[inline]
    pub(crate) fn available(&self) -> usize {
        self.sem.available_permits()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Closes the gate; pending and future acquisitions fail.
    pub(crate) fn close(&self) {
        self.sem.close();
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.sem.is_closed()
    }
}
