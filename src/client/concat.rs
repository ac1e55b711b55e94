use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::validate_key;
use super::CacheClient;
use super::ScopedTimer;
use crate::codec::CachedPayload;
use crate::constants::APPEND_OR_ADD_ADD_LEG;
use crate::constants::APPEND_OR_ADD_OPERATION;
use crate::constants::APPEND_OR_ADD_RETRY_LEG;
use crate::constants::CACHE_HIT;
use crate::constants::CACHE_MISS;
use crate::constants::WRITE;
use crate::errors::Result;
use crate::metrics::MetricsRegistry;
use crate::operation::CompletionLatch;
use crate::operation::ConcatKind;
use crate::operation::Expiration;
use crate::operation::OpCommand;
use crate::operation::OpPayload;
use crate::operation::Operation;
use crate::operation::OperationCallback;
use crate::operation::OperationFuture;
use crate::operation::OperationStatus;
use crate::operation::StatusCode;
use crate::operation::StoreKind;
use crate::transport::Transport;

impl CacheClient {
    /// Append to an existing entry, or create it when absent.
    ///
    /// Protocol: append first; when the entry does not exist, fall back to
    /// add; when the add loses a concurrent create race, retry the append
    /// once against the now-existing entry. The composite future is signaled
    /// exactly once, by whichever leg terminates the protocol, and the final
    /// outcome of a lost second race is the retry's outcome. Each leg emits
    /// its own metric so operators can see how often the race is hit.
    pub fn append_or_add(
        &self,
        key: &str,
        expiration: Expiration,
        payload: CachedPayload,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        validate_key(key)?;
        let _timer = ScopedTimer::new("client::append_or_add");

        let rv = OperationFuture::new(key, self.operation_timeout());
        let ctx = AoaContext {
            key: key.to_string(),
            expiration,
            payload,
            rv: rv.clone(),
            transport: self.inner.transport.clone(),
            metrics: self.inner.metrics.clone(),
        };
        let op = Operation::new(
            OpCommand::Concat {
                kind: ConcatKind::Append,
                key: key.to_string(),
                data: ctx.payload.data.clone(),
            },
            Box::new(AppendCallback { ctx }),
            rv.cancellation_token(),
        );
        self.attach_to_latch(latch, &rv);
        self.inner.transport.submit(op)?;
        Ok(rv)
    }
}

/// State threaded through the legs of one append-or-add call.
struct AoaContext {
    key: String,
    expiration: Expiration,
    payload: CachedPayload,
    rv: OperationFuture<bool>,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsRegistry>,
}

impl AoaContext {
    /// Terminate the composite when a follow-up leg cannot be submitted.
    fn fail_submit(&self, leg: &'static str, error: impl std::fmt::Display) {
        warn!(key = %self.key, leg, "append-or-add leg submission failed: {}", error);
        self.rv.set_result(
            Some(false),
            OperationStatus::new(StatusCode::Internal, error.to_string()),
        );
        self.rv.signal_complete();
    }
}

struct AppendCallback {
    ctx: AoaContext,
}

impl OperationCallback for AppendCallback {
    fn on_payload(&mut self, payload: OpPayload) {
        if let OpPayload::Cas(cas) = payload {
            self.ctx.rv.set_cas(cas);
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let ctx = self.ctx;
        let hit = if status.is_success() {
            CACHE_HIT
        } else {
            CACHE_MISS
        };
        ctx.metrics
            .timer(APPEND_OR_ADD_OPERATION, WRITE, Some(&status), Some(hit))
            .observe(ctx.rv.elapsed().as_millis() as f64);

        if status.is_success() {
            ctx.rv.set_result(Some(true), status);
            ctx.rv.signal_complete();
            return;
        }

        debug!(key = %ctx.key, code = %status.code, "append missed, attempting add");
        let op = Operation::new(
            OpCommand::Store {
                kind: StoreKind::Add,
                key: ctx.key.clone(),
                flags: ctx.payload.flags,
                expiration: ctx.expiration,
                data: ctx.payload.data.clone(),
            },
            Box::new(AddCallback {
                rv: ctx.rv.clone(),
                key: ctx.key.clone(),
                transport: ctx.transport.clone(),
                metrics: ctx.metrics.clone(),
                payload_data: ctx.payload.data.clone(),
            }),
            ctx.rv.cancellation_token(),
        );
        if let Err(e) = ctx.transport.submit(op) {
            ctx.fail_submit("add", e);
        }
    }
}

struct AddCallback {
    key: String,
    rv: OperationFuture<bool>,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsRegistry>,
    payload_data: Vec<u8>,
}

impl OperationCallback for AddCallback {
    fn on_payload(&mut self, payload: OpPayload) {
        if let OpPayload::Cas(cas) = payload {
            self.rv.set_cas(cas);
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let this = *self;
        if status.is_success() {
            this.metrics
                .event_counter(APPEND_OR_ADD_ADD_LEG, WRITE, Some(&status), None)
                .inc();
            this.rv.set_result(Some(true), status);
            this.rv.signal_complete();
            return;
        }

        // Another writer created the entry between the append and the add;
        // the entry exists now, so one more append settles the call.
        debug!(key = %this.key, code = %status.code, "add lost the create race, retrying append");
        let op = Operation::new(
            OpCommand::Concat {
                kind: ConcatKind::Append,
                key: this.key.clone(),
                data: this.payload_data.clone(),
            },
            Box::new(RetryAppendCallback {
                rv: this.rv.clone(),
                metrics: this.metrics.clone(),
            }),
            this.rv.cancellation_token(),
        );
        if let Err(e) = this.transport.submit(op) {
            warn!(key = %this.key, leg = "retry-append", "append-or-add leg submission failed: {}", e);
            this.rv.set_result(
                Some(false),
                OperationStatus::new(StatusCode::Internal, e.to_string()),
            );
            this.rv.signal_complete();
        }
    }
}

struct RetryAppendCallback {
    rv: OperationFuture<bool>,
    metrics: Arc<MetricsRegistry>,
}

impl OperationCallback for RetryAppendCallback {
    fn on_payload(&mut self, payload: OpPayload) {
        if let OpPayload::Cas(cas) = payload {
            self.rv.set_cas(cas);
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let this = *self;
        this.metrics
            .event_counter(APPEND_OR_ADD_RETRY_LEG, WRITE, Some(&status), None)
            .inc();
        // Retry depth is bounded at one: whatever the retry reports is the
        // composite's final outcome.
        this.rv.set_result(Some(status.is_success()), status);
        this.rv.signal_complete();
    }
}
