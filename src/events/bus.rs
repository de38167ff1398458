//! # Event bus for receiver diagnostics.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] ring for lifecycle and subscriber
//! events, plus an optional unbounded report channel that carries failure events
//! ([`Event::is_failure`]) so they cannot be overwritten by a lagging ring.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Listener (one per receiver):
//!   Receiver    ──┐  failures ──► reports (mpsc, unbounded) ──┐
//!   WorkerLoop  ──┼──► Bus                                    ├──► SubscriberSet
//!   Sub workers ──┘  others   ──► ring (broadcast, bounded) ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Lossless failures**: while the report receiver is alive, failure events go there.
//! - **Bounded ring**: other events share a ring of `ReceiverConfig::bus_capacity`;
//!   a slow listener sees `RecvError::Lagged(n)` and skips `n` of them.
//! - **No persistence**: events are dropped when nobody is listening.

use tokio::sync::{broadcast, mpsc};

use super::event::Event;

/// Broadcast channel for receiver events.
///
/// Cheap to clone (internally holds `Arc`-backed senders).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    reports: Option<mpsc::UnboundedSender<Event>>,
}

impl Bus {
    /// Creates a new bus with the given ring capacity (clamped to at least 1).
    ///
    /// Every event, failures included, goes through the ring.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx, reports: None }
    }

    /// Creates a bus whose failure events bypass the ring.
    ///
    /// Dropping the returned receiver routes failures back through the ring.
    pub fn with_reports(capacity: usize) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (reports, rx) = mpsc::unbounded_channel();
        let mut bus = Self::new(capacity);
        bus.reports = Some(reports);
        (bus, rx)
    }

    /// Publishes an event; dropped if nobody is listening.
    pub fn publish(&self, ev: Event) {
        let ev = match &self.reports {
            Some(reports) if ev.is_failure() => match reports.send(ev) {
                Ok(()) => return,
                Err(mpsc::error::SendError(ev)) => ev,
            },
            _ => ev,
        };
        let _ = self.tx.send(ev);
    }

    /// Creates a new ring receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
