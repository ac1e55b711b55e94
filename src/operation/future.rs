use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use super::OperationStatus;
use super::DEFAULT_WAIT_TIMEOUT;

/// Listener invoked once when a future reaches a terminal state.
pub type CompletionListener = Box<dyn FnOnce(&OperationStatus) + Send>;

/// Completion handle for one submitted operation.
///
/// Cloneable; every clone observes the same shared state. The transport's
/// callback thread is the only writer of the result cell, arbitrary caller
/// tasks read it after awaiting completion.
pub struct OperationFuture<T> {
    inner: Arc<FutureInner<T>>,
}

impl<T> Clone for OperationFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct FutureInner<T> {
    key: String,
    state: Mutex<FutureState<T>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    start: Instant,
    wait_timeout: Duration,
    cancel: CancellationToken,
}

struct FutureState<T> {
    result: Option<T>,
    status: Option<OperationStatus>,
    cas: Option<u64>,
    completed: bool,
    cancelled: bool,
    listeners: Vec<CompletionListener>,
}

/// Everything a waiter learns about a finished (or timed-out) operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult<T> {
    pub value: Option<T>,
    pub status: OperationStatus,
    pub cas: Option<u64>,
}

impl<T> OperationResult<T> {
    pub(crate) fn timed_out() -> Self {
        Self {
            value: None,
            status: OperationStatus::timed_out(),
            cas: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl<T: Send + 'static> OperationFuture<T> {
    pub fn new(key: impl Into<String>, wait_timeout: Duration) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            inner: Arc::new(FutureInner {
                key: key.into(),
                state: Mutex::new(FutureState {
                    result: None,
                    status: None,
                    cas: None,
                    completed: false,
                    cancelled: false,
                    listeners: Vec::new(),
                }),
                done_tx,
                done_rx,
                start: Instant::now(),
                wait_timeout: if wait_timeout.is_zero() {
                    DEFAULT_WAIT_TIMEOUT
                } else {
                    wait_timeout
                },
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Token the driver hands to the transport alongside the operation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Time elapsed since the operation was created.
    pub fn elapsed(&self) -> Duration {
        self.inner.start.elapsed()
    }

    /// Store the terminal result. At most one call takes effect; later calls
    /// log a warning and leave the first result in place.
    pub fn set_result(&self, value: Option<T>, status: OperationStatus) {
        let mut state = self.inner.state.lock();
        if state.status.is_some() {
            warn!(
                key = %self.inner.key,
                ?status,
                "result already set, ignoring second set_result"
            );
            return;
        }
        state.result = value;
        state.status = Some(status);
    }

    /// Attach the version token reported by the transport.
    pub fn set_cas(&self, cas: u64) {
        self.inner.state.lock().cas = Some(cas);
    }

    /// Mark the future complete: release every waiter and fire the listeners.
    ///
    /// Safe to call after `cancel()` or a second time; the late signal is
    /// logged and dropped so a terminal callback arriving after cancellation
    /// never double-fires.
    pub fn signal_complete(&self) {
        let (listeners, status) = {
            let mut state = self.inner.state.lock();
            if state.completed || state.cancelled {
                debug!(key = %self.inner.key, "late completion signal ignored");
                return;
            }
            state.completed = true;
            let status = state
                .status
                .clone()
                .unwrap_or_else(|| OperationStatus::success());
            if state.status.is_none() {
                state.status = Some(status.clone());
            }
            (std::mem::take(&mut state.listeners), status)
        };
        for listener in listeners {
            listener(&status);
        }
        let _ = self.inner.done_tx.send(true);
    }

    /// Request cancellation of the underlying operation (best effort) and
    /// transition to the cancelled terminal state. No timing metric is
    /// emitted for cancelled operations.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        let listeners = {
            let mut state = self.inner.state.lock();
            if state.completed || state.cancelled {
                return;
            }
            state.cancelled = true;
            state.status = Some(OperationStatus::cancelled());
            std::mem::take(&mut state.listeners)
        };
        let status = OperationStatus::cancelled();
        for listener in listeners {
            listener(&status);
        }
        let _ = self.inner.done_tx.send(true);
    }

    pub fn is_done(&self) -> bool {
        let state = self.inner.state.lock();
        state.completed || state.cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Snapshot of the terminal status, if one has been set.
    pub fn status(&self) -> Option<OperationStatus> {
        self.inner.state.lock().status.clone()
    }

    /// Register a completion listener. Fires immediately when the future is
    /// already terminal. Listener invocation order is unspecified.
    pub fn add_listener(&self, listener: CompletionListener) {
        let fire_now = {
            let mut state = self.inner.state.lock();
            if state.completed || state.cancelled {
                state.status.clone()
            } else {
                state.listeners.push(listener);
                return;
            }
        };
        if let Some(status) = fire_now {
            listener(&status);
        }
    }
}

impl<T: Clone + Send + 'static> OperationFuture<T> {
    /// Await completion using the future's configured timeout.
    pub async fn wait(&self) -> OperationResult<T> {
        self.wait_timeout(self.inner.wait_timeout).await
    }

    /// Await completion for up to `timeout`.
    ///
    /// Expiry returns the distinguished timeout outcome and leaves the
    /// operation running; a result arriving later is simply never read by
    /// this waiter. Concurrent waiters all observe the same result.
    pub async fn wait_timeout(&self, timeout: Duration) -> OperationResult<T> {
        let mut done = self.inner.done_rx.clone();
        let completed = tokio::time::timeout(timeout, async {
            loop {
                if *done.borrow_and_update() {
                    return;
                }
                if done.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;

        if completed.is_err() {
            debug!(key = %self.inner.key, ?timeout, "wait timed out");
            return OperationResult::timed_out();
        }

        let state = self.inner.state.lock();
        OperationResult {
            value: state.result.clone(),
            status: state
                .status
                .clone()
                .unwrap_or_else(OperationStatus::cancelled),
            cas: state.cas,
        }
    }
}

impl<T> std::fmt::Debug for OperationFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("OperationFuture")
            .field("key", &self.inner.key)
            .field("completed", &state.completed)
            .field("cancelled", &state.cancelled)
            .field("status", &state.status)
            .finish()
    }
}
