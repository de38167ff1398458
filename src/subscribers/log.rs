//! # LogWriter - simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [started] receiver=memory/memory-0 limit=4
//! [handler-failed] receiver=memory/memory-0 err="handler failed: processing failed: bad payload"
//! [fetch-failed] receiver=memory/memory-0 err="fetch failed: receive error: reset" failures=1 delay_ms=100
//! [fetch-abandoned] receiver=memory/memory-0 requested=4
//! [stop-requested] receiver=memory/memory-0
//! [stopped] receiver=memory/memory-0
//! [events-lagged] skipped=12
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let receiver = format!(
            "{}/{}",
            e.receiver_kind.as_deref().unwrap_or("-"),
            e.receiver_id.as_deref().unwrap_or("-")
        );
        match e.kind {
            EventKind::ReceiverStarted => {
                println!(
                    "[started] receiver={receiver} limit={}",
                    e.requested.unwrap_or_default()
                );
            }
            EventKind::StopRequested => {
                println!("[stop-requested] receiver={receiver}");
            }
            EventKind::ReceiverStopped => {
                println!("[stopped] receiver={receiver}");
            }
            EventKind::ReceiverDisposed => {
                println!("[disposed] receiver={receiver}");
            }
            EventKind::FetchFailed => {
                println!(
                    "[fetch-failed] receiver={receiver} err={:?} failures={} delay_ms={}",
                    e.reason.as_deref().unwrap_or("unknown"),
                    e.attempt.unwrap_or_default(),
                    e.delay_ms.unwrap_or_default()
                );
            }
            EventKind::FetchAbandoned => {
                println!(
                    "[fetch-abandoned] receiver={receiver} requested={}",
                    e.requested.unwrap_or_default()
                );
            }
            EventKind::HandlerFailed => {
                println!(
                    "[handler-failed] receiver={receiver} err={:?}",
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::WorkerPanicked => {
                println!(
                    "[worker-panicked] receiver={receiver} info={}",
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::EventsLagged => {
                println!("[events-lagged] skipped={}", e.skipped.unwrap_or_default());
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] subscriber={receiver} reason={:?}",
                    e.reason
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={receiver} info={}",
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
