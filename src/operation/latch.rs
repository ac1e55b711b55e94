use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::OperationFuture;

/// Threshold signalling over a set of operation futures.
///
/// A write issued against several destinations can be reported durable once a
/// policy-chosen number of them acknowledge; the remaining futures keep
/// running in the background and stay observable through their own handles.
#[derive(Clone)]
pub struct CompletionLatch {
    inner: Arc<LatchInner>,
}

struct LatchInner {
    target: usize,
    registered: AtomicUsize,
    completed: AtomicUsize,
    satisfied_tx: watch::Sender<bool>,
    satisfied_rx: watch::Receiver<bool>,
}

impl CompletionLatch {
    /// Latch satisfied once `target` attached futures complete. A target of
    /// zero is satisfied from birth.
    pub fn new(target: usize) -> Self {
        let (satisfied_tx, satisfied_rx) = watch::channel(target == 0);
        Self {
            inner: Arc::new(LatchInner {
                target,
                registered: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                satisfied_tx,
                satisfied_rx,
            }),
        }
    }

    /// Build a latch over an existing set of futures. `target` is clamped to
    /// the number of futures so the latch can always be satisfied.
    pub fn for_futures<T: Send + 'static>(futures: &[OperationFuture<T>], target: usize) -> Self {
        let latch = Self::new(target.min(futures.len()));
        for future in futures {
            latch.attach(future);
        }
        latch
    }

    /// Subscribe to one future's completion. The completion that makes the
    /// count reach the target is the only one that fires the satisfied
    /// signal; the atomic increment guarantees a single crossing even when
    /// callbacks race on different transport threads.
    pub fn attach<T: Send + 'static>(&self, future: &OperationFuture<T>) {
        self.inner.registered.fetch_add(1, Ordering::AcqRel);
        let inner = self.inner.clone();
        future.add_listener(Box::new(move |_status| {
            let completed = inner.completed.fetch_add(1, Ordering::AcqRel) + 1;
            if completed == inner.target {
                let _ = inner.satisfied_tx.send(true);
            }
        }));
    }

    /// Await satisfaction for up to `timeout`. Returns `true` when the target
    /// was reached, `false` on expiry.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut satisfied = self.inner.satisfied_rx.clone();
        tokio::time::timeout(timeout, async {
            loop {
                if *satisfied.borrow_and_update() {
                    return;
                }
                if satisfied.changed().await.is_err() {
                    return;
                }
            }
        })
        .await
        .is_ok()
    }

    pub fn is_satisfied(&self) -> bool {
        *self.inner.satisfied_rx.borrow()
    }

    pub fn target(&self) -> usize {
        self.inner.target
    }

    pub fn completed_count(&self) -> usize {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn registered_count(&self) -> usize {
        self.inner.registered.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CompletionLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("target", &self.inner.target)
            .field("registered", &self.registered_count())
            .field("completed", &self.completed_count())
            .field("satisfied", &self.is_satisfied())
            .finish()
    }
}
