//! # WorkerLoop: fetch, dispatch, repeat.
//!
//! The single background task of a started receiver.
//!
//! ## Architecture
//! ```text
//! Receiver::start ──► tokio::spawn(WorkerLoop::run(token))
//!
//! while state == Running {
//!   ├─► reap finished dispatch units (report failures)
//!   ├─► gate full? → wait for one unit to finish, re-loop
//!   ├─► requested = max(gate.available(), 1), capped by max_batch   (hint only)
//!   ├─► fetch_or_abandon(requested)
//!   │     ├─ Abandoned          → publish FetchAbandoned, exit
//!   │     ├─ Err(e)             → publish FetchFailed, backoff (cancellable), re-loop
//!   │     └─ Fetched(batch)
//!   │           ├─ state != Running → discard batch, exit
//!   │           ├─ empty            → yield, re-loop
//!   │           └─ otherwise        → dispatch(batch), wait for one unit, re-loop
//! }
//! drain: join every unit (queued ones see cancellation, running ones finish)
//! ```
//!
//! ## Rules
//! - `PumpError::Canceled` is never reported.
//! - Every other unit failure is reported exactly once, when its unit is joined.
//! - The requested batch size never affects the concurrency bound; the gate does.

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::core::config::ReceiverConfig;
use crate::core::dispatch::{Dispatcher, UnitResult};
use crate::core::fetch::{FetchOutcome, fetch_or_abandon};
use crate::core::gate::ThrottleGate;
use crate::core::state::StateCell;
use crate::error::PumpError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;
use crate::transport::Transport;

/// Receiver identity attached to every published event.
#[derive(Clone, Debug)]
pub(crate) struct Ident {
    pub kind: Arc<str>,
    pub id: Arc<str>,
}

impl Ident {
    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_receiver(Arc::clone(&self.kind), Arc::clone(&self.id))
    }
}

/// Background loop state for one start/stop cycle.
pub(crate) struct WorkerLoop<T: Transport> {
    pub transport: Arc<T>,
    pub dispatcher: Dispatcher<T::Message>,
    pub gate: ThrottleGate,
    pub state: Arc<StateCell>,
    pub cfg: ReceiverConfig,
    pub ident: Ident,
    pub bus: Bus,
}

impl<T: Transport> WorkerLoop<T> {
    /// Runs until the receiver leaves `Running`, then drains every dispatch unit.
    pub(crate) async fn run(mut self, token: CancellationToken) {
        let mut in_flight: JoinSet<UnitResult> = JoinSet::new();
        let mut fetch_failures: u32 = 0;

        while self.state.is_running() {
            while let Some(res) = in_flight.try_join_next() {
                self.report_unit(res);
            }

            if self.gate.available() == 0 && !in_flight.is_empty() {
                if !self.wait_one(&mut in_flight, &token).await {
                    break;
                }
                continue;
            }

            let requested = self.requested_size();
            let outcome = fetch_or_abandon(
                self.transport.as_ref(),
                requested,
                &token,
                self.cfg.fetch_timeout(),
            )
            .await;

            match outcome {
                Ok(FetchOutcome::Abandoned) => {
                    let ev = self.ident.event(EventKind::FetchAbandoned);
                    self.bus.publish(ev.with_requested(requested));
                    break;
                }
                Ok(FetchOutcome::Fetched(batch)) => {
                    fetch_failures = 0;
                    if !self.state.is_running() {
                        break;
                    }
                    if batch.is_empty() {
                        tokio::task::yield_now().await;
                        continue;
                    }
                    self.dispatcher.dispatch(batch, &mut in_flight);
                    if !self.wait_one(&mut in_flight, &token).await {
                        break;
                    }
                }
                Err(e) if e.is_canceled() => break,
                Err(e) => {
                    if !self.state.is_running() {
                        break;
                    }
                    fetch_failures = fetch_failures.saturating_add(1);
                    if !self.on_fetch_failed(&e, fetch_failures, &token).await {
                        break;
                    }
                }
            }
        }

        while let Some(res) = in_flight.join_next().await {
            self.report_unit(res);
        }
    }

    /// Gate-sized request, at least 1, capped by `max_batch`.
    fn requested_size(&self) -> usize {
        let n = self.gate.available().max(1);
        match self.cfg.batch_cap() {
            Some(cap) => n.min(cap),
            None => n,
        }
    }

    /// Waits for the next unit to finish. Returns `false` if stop fired first.
    async fn wait_one(
        &self,
        in_flight: &mut JoinSet<UnitResult>,
        token: &CancellationToken,
    ) -> bool {
        select! {
            res = in_flight.join_next() => {
                if let Some(res) = res {
                    self.report_unit(res);
                }
                true
            }
            _ = token.cancelled() => false,
        }
    }

    /// Publishes the failure, then sleeps the configured backoff.
    /// Returns `false` if stop fired during the sleep.
    async fn on_fetch_failed(
        &self,
        err: &PumpError,
        failures: u32,
        token: &CancellationToken,
    ) -> bool {
        let delay = self.cfg.fetch_backoff.map(|b| b.next(failures - 1));

        let mut ev = self
            .ident
            .event(EventKind::FetchFailed)
            .with_error(err)
            .with_attempt(failures);
        if let Some(d) = delay {
            ev = ev.with_delay(d);
        }
        self.bus.publish(ev);

        let Some(delay) = delay else {
            return true;
        };
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => true,
            _ = token.cancelled() => false,
        }
    }

    fn report_unit(&self, res: Result<UnitResult, JoinError>) {
        let err = match res {
            Ok(Ok(())) => return,
            Ok(Err(e)) if e.is_canceled() => return,
            Ok(Err(e)) => e,
            Err(join_err) if join_err.is_panic() => PumpError::HandlerPanicked {
                info: panic_message(join_err.into_panic().as_ref()),
            },
            Err(_aborted) => return,
        };
        self.bus
            .publish(self.ident.event(EventKind::HandlerFailed).with_error(&err));
    }
}
