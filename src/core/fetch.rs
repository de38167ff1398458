//! # Cancellable fetch race.
//!
//! Runs [`Transport::fetch_batch`] against the stop signal so the worker loop
//! answers a stop promptly even when the transport ignores cancellation.
//!
//! ```text
//! fetch_or_abandon(requested)
//!   ├─► child = token.child_token()
//!   ├─► fetch_batch(requested, child)   [optionally wrapped in a timeout]
//!   └─► select (biased):
//!         ├─ fetch finished   → Fetched(batch) / Err(Fetch | FetchTimeout)
//!         └─ token cancelled  → child.cancel(), drop the fetch → Abandoned
//! ```
//!
//! ## Rules
//! - A fetch that already completed wins over a simultaneous stop; the caller
//!   re-checks the run state and discards the batch.
//! - Abandoning drops the fetch future, which cancels it for any async transport.
//!   Whatever it had received is lost to this receiver and left to the transport's
//!   redelivery.

use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::PumpError;
use crate::transport::Transport;

/// Result of one race.
#[derive(Debug)]
pub(crate) enum FetchOutcome<M> {
    /// The fetch finished first (the batch may be empty).
    Fetched(Vec<M>),
    /// Stop was requested before the fetch finished; treated as an empty batch.
    Abandoned,
}

/// Races one fetch against `token`.
pub(crate) async fn fetch_or_abandon<T: Transport + ?Sized>(
    transport: &T,
    requested: usize,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<FetchOutcome<T::Message>, PumpError> {
    let child = token.child_token();

    let fetch = async {
        let call = transport.fetch_batch(requested, child.clone());
        match timeout {
            Some(dur) => match time::timeout(dur, call).await {
                Ok(res) => res.map_err(PumpError::Fetch),
                Err(_elapsed) => {
                    child.cancel();
                    Err(PumpError::FetchTimeout { timeout: dur })
                }
            },
            None => call.await.map_err(PumpError::Fetch),
        }
    };
    tokio::pin!(fetch);

    select! {
        biased;
        res = &mut fetch => res.map(FetchOutcome::Fetched),
        _ = token.cancelled() => {
            child.cancel();
            Ok(FetchOutcome::Abandoned)
        }
    }
}
