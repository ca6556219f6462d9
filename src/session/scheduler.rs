//! Reconnection timer
//!
//! A passive timer per scheduled retry, each with its own cancellation
//! token. The timer knows nothing about sessions; the callback it fires
//! re-checks the session state under the session lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A retry that has been scheduled but not fired
#[derive(Debug)]
pub(crate) struct ScheduledRetry {
    pub id: u64,
    pub cancel: CancellationToken,
}

pub(crate) struct ReconnectScheduler {
    runtime: Handle,
    next_id: AtomicU64,
}

impl ReconnectScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
        }
    }

    /// Run `on_fire(id)` after `delay` unless the returned token is cancelled first
    pub fn schedule<F>(&self, delay: Duration, on_fire: F) -> ScheduledRetry
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(retry_id = id, "Retry cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        on_fire(id);
                    }
                }
            }
        });

        ScheduledRetry { id, cancel }
    }
}
