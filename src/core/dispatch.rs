//! # Dispatch supervisor: one gated unit of work per message.
//!
//! Every message of a batch becomes its own task in the worker loop's [`JoinSet`]:
//!
//! ```text
//! dispatch(batch)
//!   for message in batch (fetch order):
//!     ├─ gate has a free permit and nobody is queued → take it now, spawn unit
//!     └─ otherwise → spawn unit that waits for its predecessor's admission,
//!                    then acquires (cancellable)
//!
//! unit:
//!   permit = gate.acquire(token)?      ── Canceled if stop fires while waiting
//!   handler.handle(message).await      ── never interrupted once started
//!   drop(permit)                       ── on every exit path (RAII)
//! ```
//!
//! ## Rules
//! - Admission to the gate is FIFO in fetch order, across batches.
//! - A unit's error is its own result; siblings and the loop are unaffected.
//! - Handler panics are contained by the `JoinSet` and surface as `JoinError`.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::gate::{GatePermit, ThrottleGate};
use crate::error::PumpError;
use crate::handlers::HandlerRef;

/// Result type of every dispatch unit.
pub(crate) type UnitResult = Result<(), PumpError>;

/// Spawns gated handler invocations for fetched batches.
pub(crate) struct Dispatcher<M> {
    handler: HandlerRef<M>,
    gate: ThrottleGate,
    token: CancellationToken,
    /// Admission signal of the most recently queued unit.
    tail: Option<oneshot::Receiver<()>>,
}

impl<M: Send + 'static> Dispatcher<M> {
    pub(crate) fn new(
        handler: HandlerRef<M>,
        gate: ThrottleGate,
        token: CancellationToken,
    ) -> Self {
        Self {
            handler,
            gate,
            token,
            tail: None,
        }
    }

    /// Submits every message of `batch`, in order, into `in_flight`.
    pub(crate) fn dispatch(&mut self, batch: Vec<M>, in_flight: &mut JoinSet<UnitResult>) {
        for message in batch {
            self.submit(message, in_flight);
        }
    }

    fn submit(&mut self, message: M, in_flight: &mut JoinSet<UnitResult>) {
        let handler = Arc::clone(&self.handler);

        if !self.queue_pending() {
            if let Some(permit) = self.gate.try_acquire() {
                in_flight.spawn(run_admitted(handler, permit, message));
                return;
            }
        }

        let (admitted_tx, admitted_rx) = oneshot::channel();
        let predecessor = self.tail.replace(admitted_rx);
        let gate = self.gate.clone();
        let token = self.token.clone();

        in_flight.spawn(async move {
            if let Some(prev) = predecessor {
                // Err means the predecessor gave up (stop); acquire sees the same token.
                let _ = prev.await;
            }
            let acquired = gate.acquire(&token).await;
            let _ = admitted_tx.send(());
            let permit = acquired?;
            run_admitted(handler, permit, message).await
        });
    }

    /// True while some earlier unit is still waiting for admission.
    fn queue_pending(&mut self) -> bool {
        let Some(tail) = self.tail.as_mut() else {
            return false;
        };
        match tail.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => true,
            Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                self.tail = None;
                false
            }
        }
    }
}

async fn run_admitted<M: Send + 'static>(
    handler: HandlerRef<M>,
    permit: GatePermit,
    message: M,
) -> UnitResult {
    let res = handler.handle(message).await;
    drop(permit);
    res.map_err(PumpError::Handler)
}
