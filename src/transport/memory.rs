//! In-process transport backed by a shared queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::Transport;
use crate::error::TransportError;

struct Inner<M> {
    queue: Mutex<VecDeque<M>>,
    notify: Notify,
    open: AtomicBool,
}

/// Cloneable handle to an in-memory message queue.
///
/// Producers call [`push`](Self::push); the receiver drains it through
/// [`Transport::fetch_batch`], which waits for messages and honors cancellation.
pub struct MemoryTransport<M> {
    kind: &'static str,
    inner: Arc<Inner<M>>,
}

impl<M> Clone for MemoryTransport<M> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for MemoryTransport<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MemoryTransport<M> {
    /// Creates an empty queue reported as kind `"memory"`.
    pub fn new() -> Self {
        Self::with_kind("memory")
    }

    /// Creates an empty queue with a custom kind identifier.
    pub fn with_kind(kind: &'static str) -> Self {
        Self {
            kind,
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                open: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueues one message and wakes a waiting fetch.
    pub fn push(&self, message: M) {
        self.queue().push_back(message);
        self.inner.notify.notify_waiters();
    }

    /// Enqueues many messages in order.
    pub fn extend(&self, messages: impl IntoIterator<Item = M>) {
        self.queue().extend(messages);
        self.inner.notify.notify_waiters();
    }

    /// Messages not yet fetched.
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True between `create_receiver` and `stop_receiver`.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<M>> {
        // Every critical section is a plain push/drain, so a poisoned queue is still consistent.
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, max: usize) -> Option<Vec<M>> {
        let mut q = self.queue();
        if q.is_empty() {
            return None;
        }
        let n = max.max(1).min(q.len());
        Some(q.drain(..n).collect())
    }
}

#[async_trait]
impl<M: Send + 'static> Transport for MemoryTransport<M> {
    type Message = M;

    fn kind(&self) -> &str {
        self.kind
    }

    async fn create_receiver(&self) -> Result<(), TransportError> {
        self.inner.open.store(true, Ordering::Release);
        Ok(())
    }

    async fn fetch_batch(
        &self,
        max: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<M>, TransportError> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(batch) = self.take(max) {
                return Ok(batch);
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Ok(Vec::new()),
            }
        }
    }

    fn stop_receiver(&self) {
        self.inner.open.store(false, Ordering::Release);
    }
}
