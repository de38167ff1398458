//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out that
//! drives subscriber workers, and (with the `logging` feature) a stdout [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! WorkerLoop ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                         ├──► [queue] ──► LogWriter
//!                                                         ├──► [queue] ──► Metrics
//!                                                         └──► [queue] ──► Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscribe::Subscribe;
