use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::warn;

use super::validate_key;
use super::CacheClient;
use super::ScopedTimer;
use crate::codec::CachedPayload;
use crate::codec::Codec;
use crate::constants::CACHE_HIT;
use crate::constants::CACHE_MISS;
use crate::constants::GET_AND_TOUCH_OPERATION;
use crate::constants::GET_OPERATION;
use crate::constants::READ;
use crate::errors::Result;
use crate::metrics::MetricsRegistry;
use crate::operation::CasValue;
use crate::operation::Expiration;
use crate::operation::OpCommand;
use crate::operation::OpPayload;
use crate::operation::Operation;
use crate::operation::OperationCallback;
use crate::operation::OperationFuture;
use crate::operation::OperationStatus;

impl CacheClient {
    /// Submit a fetch for one key.
    ///
    /// The returned future resolves to the decoded value on a hit, `None` on
    /// a miss. One read-metric sample is recorded per completion, tagged
    /// with the terminal status and hit-or-miss.
    ///
    /// # Errors
    /// - [`crate::errors::KeyError`] when the key violates the transport's
    ///   key-format constraints
    /// - [`crate::errors::TransportError`] when submission is rejected
    pub fn async_get<T>(
        &self,
        key: &str,
        codec: Arc<dyn Codec<T>>,
    ) -> Result<OperationFuture<T>>
    where
        T: Send + 'static,
    {
        validate_key(key)?;
        let _timer = ScopedTimer::new("client::async_get");

        let rv = OperationFuture::new(key, self.read_timeout());
        let callback = GetCallback {
            key: key.to_string(),
            rv: rv.clone(),
            metrics: self.inner.metrics.clone(),
            codec,
            value: None,
        };
        let op = Operation::new(
            OpCommand::Get {
                keys: vec![key.to_string()],
            },
            Box::new(callback),
            rv.cancellation_token(),
        );
        self.inner.transport.submit(op)?;
        Ok(rv)
    }

    /// Submit a fetch that also refreshes the entry's expiration.
    ///
    /// Resolves to the decoded value together with its version token.
    pub fn async_get_and_touch<T>(
        &self,
        key: &str,
        expiration: Expiration,
        codec: Arc<dyn Codec<T>>,
    ) -> Result<OperationFuture<CasValue<T>>>
    where
        T: Send + 'static,
    {
        validate_key(key)?;
        let _timer = ScopedTimer::new("client::async_get_and_touch");

        let rv = OperationFuture::new(key, self.read_timeout());
        let callback = GetAndTouchCallback {
            key: key.to_string(),
            rv: rv.clone(),
            metrics: self.inner.metrics.clone(),
            codec,
            value: None,
        };
        let op = Operation::new(
            OpCommand::GetAndTouch {
                key: key.to_string(),
                expiration,
            },
            Box::new(callback),
            rv.cancellation_token(),
        );
        self.inner.transport.submit(op)?;
        Ok(rv)
    }
}

struct GetCallback<T> {
    key: String,
    rv: OperationFuture<T>,
    metrics: Arc<MetricsRegistry>,
    codec: Arc<dyn Codec<T>>,
    value: Option<T>,
}

impl<T: Send + 'static> OperationCallback for GetCallback<T> {
    fn on_payload(&mut self, payload: OpPayload) {
        match payload {
            OpPayload::Value { key, flags, data } => {
                if key != self.key {
                    error!(
                        requested = %self.key,
                        returned = %key,
                        "wrong key returned, dropping data"
                    );
                    return;
                }
                self.metrics
                    .data_size(GET_OPERATION, READ)
                    .observe(data.len() as f64);
                match self.codec.decode(&CachedPayload::new(flags, data)) {
                    Ok(value) => self.value = Some(value),
                    Err(e) => error!(key = %self.key, "failed to decode value: {}", e),
                }
            }
            other => debug!(key = %self.key, ?other, "unexpected payload for get"),
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let this = *self;
        let hit = if this.value.is_some() {
            CACHE_HIT
        } else {
            CACHE_MISS
        };
        let timer = this
            .metrics
            .timer(GET_OPERATION, READ, Some(&status), Some(hit));
        this.rv.set_result(this.value, status);
        timer.observe(this.rv.elapsed().as_millis() as f64);
        this.rv.signal_complete();
    }
}

struct GetAndTouchCallback<T> {
    key: String,
    rv: OperationFuture<CasValue<T>>,
    metrics: Arc<MetricsRegistry>,
    codec: Arc<dyn Codec<T>>,
    value: Option<CasValue<T>>,
}

impl<T: Send + 'static> OperationCallback for GetAndTouchCallback<T> {
    fn on_payload(&mut self, payload: OpPayload) {
        match payload {
            OpPayload::ValueCas {
                key,
                cas,
                flags,
                data,
            } => {
                if key != self.key {
                    // Identity mismatch here is survivable: the token still
                    // refers to the entry this operation touched.
                    warn!(requested = %self.key, returned = %key, "wrong key returned");
                }
                self.metrics
                    .data_size(GET_OPERATION, READ)
                    .observe(data.len() as f64);
                match self.codec.decode(&CachedPayload::new(flags, data)) {
                    Ok(value) => {
                        self.rv.set_cas(cas);
                        self.value = Some(CasValue { cas, value });
                    }
                    Err(e) => error!(key = %self.key, "failed to decode value: {}", e),
                }
            }
            other => debug!(key = %self.key, ?other, "unexpected payload for get-and-touch"),
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        let this = *self;
        let hit = if this.value.is_some() {
            CACHE_HIT
        } else {
            CACHE_MISS
        };
        let timer = this
            .metrics
            .timer(GET_AND_TOUCH_OPERATION, READ, Some(&status), Some(hit));
        this.rv.set_result(this.value, status);
        timer.observe(this.rv.elapsed().as_millis() as f64);
        this.rv.signal_complete();
    }
}
