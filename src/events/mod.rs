//! Receiver events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** a receiver
//! publishes diagnostics on. Failure events are the logging path for fetch and
//! handler errors; subscribers decide what to do with them.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Receiver` (lifecycle), `WorkerLoop` (failures, abandoned
//!   fetches), `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the receiver's listener task, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
