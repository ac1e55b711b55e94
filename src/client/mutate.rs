use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::validate_key;
use super::CacheClient;
use super::ScopedTimer;
use crate::constants::DECR_OPERATION;
use crate::constants::INCR_OPERATION;
use crate::constants::WRITE;
use crate::metrics::MetricsRegistry;
use crate::operation::Expiration;
use crate::operation::MutateKind;
use crate::operation::OpCommand;
use crate::operation::OpPayload;
use crate::operation::Operation;
use crate::operation::OperationCallback;
use crate::operation::OperationFuture;
use crate::operation::OperationStatus;

impl CacheClient {
    /// Increment a counter, creating it at `default` when absent.
    ///
    /// Blocks the caller up to the mutate timeout and returns `default` on
    /// timeout or failure; counters are exposed as plain numeric returns,
    /// not futures.
    pub async fn incr(&self, key: &str, by: u64, default: u64, expiration: Expiration) -> u64 {
        self.mutate(MutateKind::Incr, INCR_OPERATION, key, by, default, expiration)
            .await
    }

    /// Decrement a counter, creating it at `default` when absent.
    pub async fn decr(&self, key: &str, by: u64, default: u64, expiration: Expiration) -> u64 {
        self.mutate(MutateKind::Decr, DECR_OPERATION, key, by, default, expiration)
            .await
    }

    async fn mutate(
        &self,
        kind: MutateKind,
        operation: &'static str,
        key: &str,
        delta: u64,
        default: u64,
        expiration: Expiration,
    ) -> u64 {
        let _timer = ScopedTimer::new("client::mutate");

        if let Err(e) = validate_key(key) {
            warn!(key = %key, operation, "invalid key for mutate, returning default: {}", e);
            return default;
        }

        let rv = OperationFuture::new(key, self.mutate_timeout());
        let callback = MutateCallback {
            rv: rv.clone(),
            metrics: self.inner.metrics.clone(),
            operation,
            value: None,
        };
        let op = Operation::new(
            OpCommand::Mutate {
                kind,
                key: key.to_string(),
                delta,
                default,
                expiration,
            },
            Box::new(callback),
            rv.cancellation_token(),
        );
        if let Err(e) = self.inner.transport.submit(op) {
            warn!(key = %key, operation, "mutate submission failed, returning default: {}", e);
            return default;
        }

        let result = rv.wait_timeout(self.mutate_timeout()).await;
        if result.is_success() {
            result.value.unwrap_or(default)
        } else {
            debug!(
                key = %key,
                operation,
                code = %result.status.code,
                default,
                "mutate did not complete, returning default"
            );
            default
        }
    }
}

struct MutateCallback {
    rv: OperationFuture<u64>,
    metrics: Arc<MetricsRegistry>,
    operation: &'static str,
    value: Option<u64>,
}

impl OperationCallback for MutateCallback {
    fn on_payload(&mut self, payload: OpPayload) {
        match payload {
            OpPayload::Counter(value) => self.value = Some(value),
            other => debug!(?other, "unexpected payload for mutate"),
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let this = *self;
        let timer = this.metrics.timer(this.operation, WRITE, None, None);
        this.rv.set_result(this.value, status);
        timer.observe(this.rv.elapsed().as_millis() as f64);
        this.rv.signal_complete();
    }
}
