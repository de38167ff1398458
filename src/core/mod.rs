//! Runtime core: the message pump and its lifecycle.
//!
//! The public API from this module is [`Receiver`], [`ReceiverBuilder`],
//! [`ReceiverConfig`] and [`RunState`].
//!
//! Internal modules, leaf-first:
//! - [`gate`]: throttle gate bounding concurrently running handlers;
//! - [`fetch`]: races a fetch against the stop signal;
//! - [`dispatch`]: one gated unit of work per message;
//! - [`worker`]: the fetch/dispatch loop;
//! - [`receiver`]: start/stop/dispose and the event listener;
//! - [`builder`]: wires transport, config and subscribers together.

mod builder;
mod config;
mod dispatch;
mod fetch;
mod gate;
mod receiver;
mod state;
mod worker;

pub use builder::ReceiverBuilder;
pub use config::ReceiverConfig;
pub use receiver::Receiver;
pub use state::RunState;
