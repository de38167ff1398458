//! # Receiver run state.
//!
//! ```text
//!            start()                 stop()
//!  Stopped ─────────► Running ─────────────► Stopping ──► Stopped
//!     ▲  setup failed   │                    (worker awaited)
//!     └─────────────────┘
//!  Stopped ── dispose() ──► Disposed   (terminal)
//! ```
//!
//! The worker loop only reads the state. It keeps looping while `Running` and
//! discards a fetch that completes after the state moved on.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Not started, or fully stopped.
    Stopped = 0,
    /// Worker loop is (being) launched and fetching.
    Running = 1,
    /// Stop requested; waiting for the worker loop to exit.
    Stopping = 2,
    /// Disposed; cannot be started again.
    Disposed = 3,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunState::Running,
            2 => RunState::Stopping,
            3 => RunState::Disposed,
            _ => RunState::Stopped,
        }
    }
}

/// Atomic cell shared between the receiver and its worker loop.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: RunState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: RunState) {
        self.0.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.load() == RunState::Running
    }
}
