//! # Receiver: lifecycle controller of one message pump.
//!
//! The [`Receiver`] owns the throttle gate, the run state, the cancellation token
//! of the current cycle and the worker task handle. It exposes three operations:
//! [`start`](Receiver::start), [`stop`](Receiver::stop) and [`dispose`](Receiver::dispose).
//!
//! ## Lifecycle
//! ```text
//! start(handler)
//!   ├─► state Running?/Stopping? → Err(AlreadyRunning), nothing changes
//!   ├─► state Disposed?          → Err(Disposed)
//!   ├─► state = Running
//!   ├─► transport.create_receiver()   ── Err → state = Stopped, Err(Setup)
//!   ├─► token = CancellationToken::new()
//!   ├─► worker = tokio::spawn(WorkerLoop::run(token))
//!   └─► publish ReceiverStarted
//!
//! stop()
//!   ├─► state != Running → return
//!   ├─► state = Stopping, publish StopRequested
//!   ├─► token.cancel()
//!   ├─► transport.stop_receiver()
//!   ├─► worker.await                  ── loop exited, every unit joined
//!   └─► state = Stopped, publish ReceiverStopped
//!
//! dispose()
//!   ├─► stop()
//!   ├─► gate.close(), state = Disposed, publish ReceiverDisposed
//!   └─► stop the event listener (subscribers drain their queues)
//! ```
//!
//! ## Rules
//! - `start`/`stop`/`dispose` are serialized by an internal async mutex.
//! - A `stop` future must be driven to completion; dropping it midway leaves the
//!   receiver in `Stopping`.
//! - Dropping a receiver cancels the current cycle without waiting for it.

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::ReceiverConfig;
use crate::core::dispatch::Dispatcher;
use crate::core::gate::ThrottleGate;
use crate::core::state::{RunState, StateCell};
use crate::core::worker::{Ident, WorkerLoop};
use crate::error::LifecycleError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;
use crate::subscribers::{SubscriberSet, panic_message};
use crate::transport::Transport;

/// Background task forwarding bus events to the subscriber set.
///
/// Failure reports arrive on their own unbounded channel and are delivered with
/// backpressure; ring lag is reported as `EventsLagged`.
struct Listener {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Listener {
    fn spawn(bus: &Bus, mut reports: mpsc::UnboundedReceiver<Event>, subs: SubscriberSet) -> Self {
        let token = CancellationToken::new();
        let mut rx = bus.subscribe();
        let stop = token.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    Some(ev) = reports.recv() => subs.deliver(ev).await,
                    res = rx.recv() => match res {
                        Ok(ev) => subs.emit(ev),
                        Err(RecvError::Lagged(n)) => subs.emit(Event::events_lagged(n)),
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            while let Ok(ev) = reports.try_recv() {
                subs.deliver(ev).await;
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => subs.emit(ev),
                    Err(TryRecvError::Lagged(n)) => subs.emit(Event::events_lagged(n)),
                    Err(_) => break,
                }
            }
            subs.shutdown().await;
        });
        Self { token, join }
    }
}

/// Per-cycle handles, guarded by the lifecycle mutex.
#[derive(Default)]
struct Slot {
    token: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
    listener: Option<Listener>,
}

/// Bounded-concurrency message pump over a [`Transport`].
///
/// Build one with [`ReceiverBuilder`](crate::ReceiverBuilder).
pub struct Receiver<T: Transport> {
    transport: Arc<T>,
    cfg: ReceiverConfig,
    ident: Ident,
    gate: ThrottleGate,
    state: Arc<StateCell>,
    bus: Bus,
    slot: Mutex<Slot>,
}

impl<T: Transport> Receiver<T> {
    pub(crate) fn new_internal(
        transport: Arc<T>,
        cfg: ReceiverConfig,
        ident: Ident,
        bus: Bus,
        reports: mpsc::UnboundedReceiver<Event>,
        subs: SubscriberSet,
    ) -> Self {
        // Without subscribers `reports` is dropped here and failures fall back to the ring.
        let listener = if subs.is_empty() {
            None
        } else {
            Some(Listener::spawn(&bus, reports, subs))
        };
        Self {
            transport,
            gate: ThrottleGate::new(cfg.concurrency_limit()),
            cfg,
            ident,
            state: Arc::new(StateCell::new(RunState::Stopped)),
            bus,
            slot: Mutex::new(Slot {
                listener,
                ..Slot::default()
            }),
        }
    }

    /// Starts pumping messages into `handler`.
    ///
    /// Returns after transport setup succeeded and the worker loop was spawned.
    ///
    /// # Errors
    /// - [`LifecycleError::AlreadyRunning`] if the receiver is running or stopping.
    /// - [`LifecycleError::Disposed`] after [`dispose`](Self::dispose).
    /// - [`LifecycleError::Setup`] if the transport failed to set up; the receiver
    ///   stays stopped and may be started again.
    pub async fn start(&self, handler: HandlerRef<T::Message>) -> Result<(), LifecycleError> {
        let mut slot = self.slot.lock().await;
        match self.state.load() {
            RunState::Stopped => {}
            RunState::Running | RunState::Stopping => return Err(LifecycleError::AlreadyRunning),
            RunState::Disposed => return Err(LifecycleError::Disposed),
        }

        self.state.store(RunState::Running);
        if let Err(e) = self.transport.create_receiver().await {
            self.state.store(RunState::Stopped);
            return Err(LifecycleError::Setup(e));
        }

        let token = CancellationToken::new();
        let worker = WorkerLoop {
            transport: Arc::clone(&self.transport),
            dispatcher: Dispatcher::new(handler, self.gate.clone(), token.clone()),
            gate: self.gate.clone(),
            state: Arc::clone(&self.state),
            cfg: self.cfg.clone(),
            ident: self.ident.clone(),
            bus: self.bus.clone(),
        };
        slot.worker = Some(tokio::spawn(worker.run(token.clone())));
        slot.token = Some(token);

        let started = self.ident.event(EventKind::ReceiverStarted);
        self.bus
            .publish(started.with_requested(self.gate.capacity()));
        Ok(())
    }

    /// Stops the worker loop and waits until it and every handler have finished.
    ///
    /// No-op unless running. Handlers already running complete; messages still
    /// waiting for a gate permit are dropped.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;
    }

    async fn stop_locked(&self, slot: &mut Slot) {
        if !self.state.is_running() {
            return;
        }
        self.state.store(RunState::Stopping);
        self.bus.publish(self.ident.event(EventKind::StopRequested));

        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        self.transport.stop_receiver();

        if let Some(worker) = slot.worker.take() {
            if let Err(e) = worker.await {
                if e.is_panic() {
                    let info = panic_message(e.into_panic().as_ref());
                    let ev = self.ident.event(EventKind::WorkerPanicked);
                    self.bus.publish(ev.with_reason(info));
                }
            }
        }

        self.state.store(RunState::Stopped);
        self.bus
            .publish(self.ident.event(EventKind::ReceiverStopped));
    }

    /// Stops the receiver, releases the gate and shuts the event listener down.
    ///
    /// Idempotent. When it returns, every subscriber has processed every event
    /// this receiver published.
    pub async fn dispose(&self) {
        let mut slot = self.slot.lock().await;
        if self.state.load() == RunState::Disposed {
            return;
        }
        self.stop_locked(&mut slot).await;

        self.gate.close();
        self.state.store(RunState::Disposed);
        self.bus
            .publish(self.ident.event(EventKind::ReceiverDisposed));

        if let Some(listener) = slot.listener.take() {
            listener.token.cancel();
            let _ = listener.join.await;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state.load()
    }

    /// Receiver instance identifier.
    pub fn id(&self) -> &str {
        &self.ident.id
    }

    /// Receiver type identifier (from [`Transport::kind`]).
    pub fn kind(&self) -> &str {
        &self.ident.kind
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.cfg
    }
}

impl<T: Transport> Drop for Receiver<T> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        if let Some(listener) = slot.listener.take() {
            listener.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        seen: std::sync::Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.clone());
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn test_listener_reports_ring_lag_and_keeps_failures() {
        let (bus, reports) = Bus::with_reports(2);
        let rec = Arc::new(Recorder::default());
        let subs = SubscriberSet::new(vec![rec.clone()], bus.clone());
        let listener = Listener::spawn(&bus, reports, subs);

        // Current-thread runtime: the listener has not been polled yet.
        for _ in 0..5 {
            bus.publish(Event::new(EventKind::StopRequested));
        }
        bus.publish(Event::new(EventKind::HandlerFailed));

        listener.token.cancel();
        listener.join.await.unwrap();

        let seen = rec.seen.lock().unwrap();
        let kinds: Vec<_> = seen.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::HandlerFailed,
                EventKind::EventsLagged,
                EventKind::StopRequested,
                EventKind::StopRequested,
            ]
        );
        assert_eq!(seen[1].skipped, Some(3));
    }
}
