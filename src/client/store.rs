use std::sync::Arc;

use tracing::debug;
use tracing::trace;

use super::validate_key;
use super::CacheClient;
use super::ScopedTimer;
use crate::codec::Codec;
use crate::constants::ADD_OPERATION;
use crate::constants::DELETE_OPERATION;
use crate::constants::REPLACE_OPERATION;
use crate::constants::SET_OPERATION;
use crate::constants::TOUCH_OPERATION;
use crate::constants::WRITE;
use crate::errors::Result;
use crate::metrics::MetricsRegistry;
use crate::operation::CompletionLatch;
use crate::operation::Expiration;
use crate::operation::OpCommand;
use crate::operation::OpPayload;
use crate::operation::Operation;
use crate::operation::OperationCallback;
use crate::operation::OperationFuture;
use crate::operation::OperationStatus;
use crate::operation::StoreKind;

impl CacheClient {
    /// Store a value unconditionally.
    ///
    /// The future resolves to the success flag; a rejected store is reported
    /// through that flag and logged, never raised. The version token the
    /// destination assigned is attached to the future.
    pub fn set<T>(
        &self,
        key: &str,
        expiration: Expiration,
        value: &T,
        codec: &dyn Codec<T>,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        self.async_store(StoreKind::Set, key, expiration, value, codec, latch)
    }

    /// Store a value only when the key does not exist yet.
    pub fn add<T>(
        &self,
        key: &str,
        expiration: Expiration,
        value: &T,
        codec: &dyn Codec<T>,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        self.async_store(StoreKind::Add, key, expiration, value, codec, latch)
    }

    /// Store a value only when the key already exists.
    pub fn replace<T>(
        &self,
        key: &str,
        expiration: Expiration,
        value: &T,
        codec: &dyn Codec<T>,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        self.async_store(StoreKind::Replace, key, expiration, value, codec, latch)
    }

    /// Remove a key.
    pub fn delete(
        &self,
        key: &str,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        validate_key(key)?;
        let _timer = ScopedTimer::new("client::delete");

        let rv = OperationFuture::new(key, self.operation_timeout());
        let callback = WriteCallback {
            key: key.to_string(),
            rv: rv.clone(),
            metrics: self.inner.metrics.clone(),
            operation: DELETE_OPERATION,
        };
        let op = Operation::new(
            OpCommand::Delete {
                key: key.to_string(),
            },
            Box::new(callback),
            rv.cancellation_token(),
        );
        self.attach_to_latch(latch, &rv);
        self.inner.transport.submit(op)?;
        Ok(rv)
    }

    /// Refresh a key's expiration without touching its value.
    pub fn touch(
        &self,
        key: &str,
        expiration: Expiration,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        validate_key(key)?;
        let _timer = ScopedTimer::new("client::touch");

        let rv = OperationFuture::new(key, self.operation_timeout());
        let callback = WriteCallback {
            key: key.to_string(),
            rv: rv.clone(),
            metrics: self.inner.metrics.clone(),
            operation: TOUCH_OPERATION,
        };
        let op = Operation::new(
            OpCommand::Touch {
                key: key.to_string(),
                expiration,
            },
            Box::new(callback),
            rv.cancellation_token(),
        );
        self.attach_to_latch(latch, &rv);
        self.inner.transport.submit(op)?;
        Ok(rv)
    }

    fn async_store<T>(
        &self,
        kind: StoreKind,
        key: &str,
        expiration: Expiration,
        value: &T,
        codec: &dyn Codec<T>,
        latch: Option<&CompletionLatch>,
    ) -> Result<OperationFuture<bool>> {
        validate_key(key)?;
        let _timer = ScopedTimer::new("client::async_store");

        let payload = codec.encode(value)?;
        let operation = match kind {
            StoreKind::Set => SET_OPERATION,
            StoreKind::Add => ADD_OPERATION,
            StoreKind::Replace => REPLACE_OPERATION,
        };

        let rv = OperationFuture::new(key, self.operation_timeout());
        let callback = WriteCallback {
            key: key.to_string(),
            rv: rv.clone(),
            metrics: self.inner.metrics.clone(),
            operation,
        };
        let op = Operation::new(
            OpCommand::Store {
                kind,
                key: key.to_string(),
                flags: payload.flags,
                expiration,
                data: payload.data,
            },
            Box::new(callback),
            rv.cancellation_token(),
        );
        self.attach_to_latch(latch, &rv);
        self.inner.transport.submit(op)?;
        Ok(rv)
    }
}

/// Shared completion shape of the mutating single-key drivers: boolean
/// success flag, version token from the payload, one write sample per
/// completion.
struct WriteCallback {
    key: String,
    rv: OperationFuture<bool>,
    metrics: Arc<MetricsRegistry>,
    operation: &'static str,
}

impl OperationCallback for WriteCallback {
    fn on_payload(&mut self, payload: OpPayload) {
        match payload {
            OpPayload::Cas(cas) => self.rv.set_cas(cas),
            other => debug!(key = %self.key, ?other, "unexpected payload for write"),
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let this = *self;
        debug!(
            key = %this.key,
            operation = this.operation,
            code = %status.code,
            elapsed_ms = this.rv.elapsed().as_millis() as u64,
            "write completed"
        );
        if !status.is_success() {
            trace!(key = %this.key, operation = this.operation, "{} storing key", status.code);
        }
        let timer = this
            .metrics
            .timer(this.operation, WRITE, Some(&status), None);
        this.rv.set_result(Some(status.is_success()), status);
        timer.observe(this.rv.elapsed().as_millis() as f64);
        this.rv.signal_complete();
    }
}
