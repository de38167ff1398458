//! Error types used by the pump runtime, its transports and handlers.
//!
//! This module defines four enums:
//!
//! - [`LifecycleError`] - misuse of the receiver surface (`start` while running, setup failure).
//! - [`PumpError`] - failures observed by the worker loop while fetching or dispatching.
//! - [`TransportError`] - failures raised by a [`Transport`](crate::Transport) implementation.
//! - [`HandlerError`] - failures raised by a user [`Handler`](crate::Handler).
//!
//! Each type provides `as_label` (stable snake_case for logs/metrics) and `as_message`.

use std::time::Duration;
use thiserror::Error;

/// # Errors returned synchronously from the receiver lifecycle surface.
///
/// These are the only failures a caller of [`Receiver::start`](crate::Receiver::start)
/// observes directly; steady-state failures surface as events instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `start` was called while the receiver is running (or stopping).
    #[error("receiver is already running")]
    AlreadyRunning,

    /// `start` was called after `dispose`.
    #[error("receiver has been disposed")]
    Disposed,

    /// The transport failed to set up its receiver.
    #[error("receiver setup failed: {0}")]
    Setup(#[source] TransportError),
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use msgpump::LifecycleError;
    ///
    /// assert_eq!(LifecycleError::AlreadyRunning.as_label(), "lifecycle_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyRunning => "lifecycle_already_running",
            LifecycleError::Disposed => "lifecycle_disposed",
            LifecycleError::Setup(_) => "lifecycle_setup_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LifecycleError::AlreadyRunning => "already running".to_string(),
            LifecycleError::Disposed => "disposed".to_string(),
            LifecycleError::Setup(e) => format!("setup: {e}"),
        }
    }
}

/// # Errors observed by the worker loop.
///
/// Everything except [`PumpError::Canceled`] is reported through the event bus;
/// `Canceled` is the expected signal of a deliberate stop and is swallowed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PumpError {
    /// The transport failed to fetch a batch.
    #[error("fetch failed: {0}")]
    Fetch(#[source] TransportError),

    /// The fetch exceeded the configured timeout and was abandoned.
    #[error("fetch timed out after {timeout:?}")]
    FetchTimeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// A handler returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// A handler panicked; the panic was contained in its dispatch unit.
    #[error("handler panicked: {info}")]
    HandlerPanicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Stop was requested while waiting (gate acquisition or fetch).
    #[error("receiver stopping")]
    Canceled,
}

impl PumpError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use msgpump::PumpError;
    ///
    /// assert_eq!(PumpError::Canceled.as_label(), "pump_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PumpError::Fetch(_) => "pump_fetch_failed",
            PumpError::FetchTimeout { .. } => "pump_fetch_timeout",
            PumpError::Handler(_) => "pump_handler_failed",
            PumpError::HandlerPanicked { .. } => "pump_handler_panicked",
            PumpError::Canceled => "pump_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PumpError::Fetch(e) => format!("fetch: {e}"),
            PumpError::FetchTimeout { timeout } => format!("fetch timeout: {timeout:?}"),
            PumpError::Handler(e) => format!("handler: {e}"),
            PumpError::HandlerPanicked { info } => format!("handler panic: {info}"),
            PumpError::Canceled => "stopping".to_string(),
        }
    }

    /// True for the shutdown signal, which is never reported.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, PumpError::Canceled)
    }
}

/// # Errors raised by a transport implementation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not reach or set up the underlying receiver.
    #[error("connection error: {error}")]
    Connection {
        /// The underlying error message.
        error: String,
    },

    /// Fetching a batch failed.
    #[error("receive error: {error}")]
    Receive {
        /// The underlying error message.
        error: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Connection { .. } => "transport_connection",
            TransportError::Receive { .. } => "transport_receive",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransportError::Connection { error } => format!("connection: {error}"),
            TransportError::Receive { error } => format!("receive: {error}"),
        }
    }
}

/// # Errors raised by a message handler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Processing the message failed.
    #[error("processing failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
        }
    }
}
