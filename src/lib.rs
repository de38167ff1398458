//! # msgpump
//!
//! **msgpump** is a bounded-concurrency message pump for Rust.
//!
//! It repeatedly pulls batches of messages from a [`Transport`], dispatches each
//! message to an async [`Handler`], caps how many handlers run at once, and shuts
//! down cooperatively even when the transport cannot cancel an outstanding fetch.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────────────────────────────────────────────────────────┐
//!  │  Receiver (lifecycle controller)                                 │
//!  │  - RunState (Stopped / Running / Stopping / Disposed)            │
//!  │  - ThrottleGate (semaphore, max_concurrent permits)              │
//!  │  - CancellationToken (one per start/stop cycle)                  │
//!  │  - Bus → listener → SubscriberSet (diagnostics)                  │
//!  └──────┬───────────────────────────────────────────────────────────┘
//!         │ start(): create_receiver(), tokio::spawn
//!         ▼
//!  ┌──────────────┐  fetch_batch(n, cancel)   ┌─────────────┐
//!  │  WorkerLoop  │ ────────────────────────► │  Transport  │
//!  │              │ ◄──────── batch ───────── │             │
//!  └──────┬───────┘   (raced against stop)    └─────────────┘
//!         │ dispatch(batch)
//!         ▼
//!  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//!  │ unit: m1     │ │ unit: m2     │ │ unit: m3     │   one task per message
//!  │ acquire gate │ │ acquire gate │ │ (waiting)    │   ≤ max_concurrent running
//!  │ handler(m1)  │ │ handler(m2)  │ │              │
//!  └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ### Worker loop
//! ```text
//! while running {
//!   ├─► requested = gate.available()   (hint)
//!   ├─► batch = fetch_or_abandon(requested)
//!   │       ├─ stop won the race → abandon fetch, exit
//!   │       ├─ Err → FetchFailed event, backoff, continue
//!   │       └─ empty → continue
//!   ├─► dispatch(batch)                (fetch order, FIFO gate admission)
//!   └─► wait for one unit to finish
//! }
//! drain all units → stop() returns
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                        |
//! |-------------------|------------------------------------------------------------------|-------------------------------------------|
//! | **Lifecycle**     | Start, stop and dispose a pump.                                  | [`Receiver`], [`ReceiverBuilder`]         |
//! | **Transports**    | Plug in any batch source; an in-memory one is included.          | [`Transport`], [`MemoryTransport`]        |
//! | **Handlers**      | Async per-message callbacks, as trait objects or closures.       | [`Handler`], [`HandlerFn`], [`HandlerRef`]|
//! | **Diagnostics**   | Failure and lifecycle events fanned out to subscribers.          | [`Subscribe`], [`Event`], [`EventKind`]   |
//! | **Policies**      | Backoff after failed fetches.                                    | [`BackoffPolicy`], [`JitterPolicy`]       |
//! | **Errors**        | Typed errors for lifecycle, pump, transport and handler faults.  | [`LifecycleError`], [`PumpError`]         |
//! | **Configuration** | Concurrency, batch cap, fetch timeout, backoff.                  | [`ReceiverConfig`]                        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use msgpump::{HandlerFn, HandlerRef, MemoryTransport, ReceiverBuilder, ReceiverConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = MemoryTransport::new();
//!     queue.extend(["a", "b", "c"]);
//!
//!     let mut cfg = ReceiverConfig::default();
//!     cfg.max_concurrent = 2;
//!     let receiver = ReceiverBuilder::new(queue.clone(), cfg).build();
//!
//!     let handled = Arc::new(AtomicUsize::new(0));
//!     let counter = Arc::clone(&handled);
//!     let handler: HandlerRef<&'static str> = HandlerFn::arc(move |msg: &'static str| {
//!         let counter = Arc::clone(&counter);
//!         async move {
//!             println!("got {msg}");
//!             counter.fetch_add(1, Ordering::SeqCst);
//!             Ok(())
//!         }
//!     });
//!
//!     receiver.start(handler).await?;
//!     while handled.load(Ordering::SeqCst) < 3 {
//!         tokio::task::yield_now().await;
//!     }
//!     receiver.dispose().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handlers;
mod policies;
mod subscribers;
mod transport;

// ---- Public re-exports ----

pub use crate::core::{Receiver, ReceiverBuilder, ReceiverConfig, RunState};
pub use error::{HandlerError, LifecycleError, PumpError, TransportError};
pub use events::{Event, EventKind};
pub use handlers::{Handler, HandlerFn, HandlerRef};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use subscribers::Subscribe;
pub use transport::{MemoryTransport, Transport};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
