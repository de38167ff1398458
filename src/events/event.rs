//! # Diagnostic events emitted by a receiver.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: start, stop request, stop completion, dispose
//! - **Failure events**: fetch and handler failures (the logging path)
//! - **Subscriber events**: overflow and panics inside the fan-out itself, and
//!   events skipped because the listener fell behind
//!
//! Every receiver-originated event carries the receiver type (`receiver_kind`, from
//! [`Transport::kind`](crate::Transport::kind)) and instance id (`receiver_id`).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use msgpump::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::HandlerFailed)
//!     .with_receiver("queue", "queue-0")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::HandlerFailed);
//! assert_eq!(ev.receiver_id.as_deref(), Some("queue-0"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::PumpError;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of receiver events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `receiver_id`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `receiver_id`: subscriber name
    /// - `reason`: `"full"` or `"closed"`
    SubscriberOverflow,

    /// The listener fell behind the bus ring buffer and skipped events.
    ///
    /// Sets `skipped` (number of events lost). Failure events never take this
    /// path; they are delivered on a separate unbounded channel.
    EventsLagged,

    // === Lifecycle events ===
    /// Transport setup succeeded and the worker loop was spawned.
    ///
    /// Sets `receiver_kind`, `receiver_id`, `requested` (gate capacity).
    ReceiverStarted,

    /// `stop` was called on a running receiver.
    StopRequested,

    /// The worker loop has exited and every dispatch has drained.
    ReceiverStopped,

    /// The receiver was disposed; no further events follow from it.
    ReceiverDisposed,

    // === Failure events ===
    /// A fetch failed or timed out.
    ///
    /// Sets:
    /// - `reason`: failure message
    /// - `label`: stable error label
    /// - `attempt`: consecutive fetch failures so far
    /// - `delay_ms`: backoff before the next fetch, if any
    FetchFailed,

    /// A fetch was still outstanding when stop was requested and was abandoned.
    ///
    /// Sets `requested` (batch size that was asked for).
    FetchAbandoned,

    /// A handler failed or panicked.
    ///
    /// Sets:
    /// - `reason`: failure message
    /// - `label`: stable error label
    HandlerFailed,

    /// The worker loop task itself panicked; the receiver is stopped.
    ///
    /// Sets `reason` (panic message).
    WorkerPanicked,
}

/// Receiver event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Receiver type identifier.
    pub receiver_kind: Option<Arc<str>>,
    /// Receiver instance identifier.
    pub receiver_id: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Stable error label (see `as_label` on the error types).
    pub label: Option<&'static str>,
    /// Batch size requested, or gate capacity on start.
    pub requested: Option<u32>,
    /// Consecutive failure count.
    pub attempt: Option<u32>,
    /// Backoff delay before the next fetch in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Number of events the listener skipped.
    pub skipped: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            receiver_kind: None,
            receiver_id: None,
            reason: None,
            label: None,
            requested: None,
            attempt: None,
            delay_ms: None,
            skipped: None,
        }
    }

    /// Attaches the receiver type and instance identifiers.
    #[inline]
    pub fn with_receiver(mut self, kind: impl Into<Arc<str>>, id: impl Into<Arc<str>>) -> Self {
        self.receiver_kind = Some(kind.into());
        self.receiver_id = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches reason and label from a pump error.
    #[inline]
    pub fn with_error(mut self, err: &PumpError) -> Self {
        self.reason = Some(err.to_string().into());
        self.label = Some(err.as_label());
        self
    }

    /// Attaches a requested size (saturating at `u32::MAX`).
    #[inline]
    pub fn with_requested(mut self, n: usize) -> Self {
        self.requested = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a consecutive failure count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
            .with_subscriber(subscriber)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(info)
            .with_subscriber(subscriber)
    }

    /// Creates a lag report for `skipped` lost events.
    #[inline]
    pub fn events_lagged(skipped: u64) -> Self {
        let mut ev = Event::new(EventKind::EventsLagged);
        ev.skipped = Some(skipped);
        ev
    }

    #[inline]
    fn with_subscriber(mut self, subscriber: &'static str) -> Self {
        self.receiver_id = Some(subscriber.into());
        self
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Failure reports: delivered to every subscriber without loss.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::FetchFailed | EventKind::HandlerFailed | EventKind::WorkerPanicked
        )
    }
}
