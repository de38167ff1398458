use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    core::{config::ReceiverConfig, receiver::Receiver, worker::Ident},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    transport::Transport,
};

/// Per-process counter for default instance ids.
static RECEIVER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Builder for constructing a [`Receiver`].
pub struct ReceiverBuilder<T: Transport> {
    transport: T,
    cfg: ReceiverConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<T: Transport> ReceiverBuilder<T> {
    /// Creates a new builder for `transport` with the given configuration.
    pub fn new(transport: T, cfg: ReceiverConfig) -> Self {
        Self {
            transport,
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers (the logging path for fetch and handler failures).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the receiver in the `Stopped` state.
    ///
    /// Spawns the subscriber workers, so it must be called from within a tokio runtime.
    pub fn build(self) -> Receiver<T> {
        let kind: Arc<str> = Arc::from(self.transport.kind());
        let id: Arc<str> = match &self.cfg.name {
            Some(name) => Arc::from(name.as_str()),
            None => {
                let n = RECEIVER_SEQ.fetch_add(1, Ordering::Relaxed);
                Arc::from(format!("{kind}-{n}"))
            }
        };

        let (bus, reports) = Bus::with_reports(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());

        Receiver::new_internal(
            Arc::new(self.transport),
            self.cfg,
            Ident { kind, id },
            bus,
            reports,
            subs,
        )
    }
}
