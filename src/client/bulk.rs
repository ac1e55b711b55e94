use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;
use tracing::warn;

use super::validate_key;
use super::CacheClient;
use super::ScopedTimer;
use crate::codec::CachedPayload;
use crate::codec::Codec;
use crate::constants::BULK_OPERATION;
use crate::constants::READ;
use crate::errors::Result;
use crate::metrics::MetricsRegistry;
use crate::operation::OpCommand;
use crate::operation::OpPayload;
use crate::operation::Operation;
use crate::operation::OperationCallback;
use crate::operation::OperationFuture;
use crate::operation::OperationResult;
use crate::operation::OperationStatus;
use crate::operation::StatusCode;
use crate::transport::DestinationId;

/// Aggregate handle for a bulk get.
///
/// Resolves to a map from key to decoded value. Keys routed to inactive
/// destinations, missing on the destination, or failing to decode are simply
/// absent. A timed-out wait returns whatever has been merged so far.
pub struct BulkGetFuture<T> {
    results: Arc<DashMap<String, T>>,
    aggregate: OperationFuture<()>,
}

impl<T: Clone + Send + 'static> BulkGetFuture<T> {
    /// Await the aggregate using the client's read timeout.
    pub async fn wait(&self) -> OperationResult<HashMap<String, T>> {
        let result = self.aggregate.wait().await;
        self.collect(result.status)
    }

    /// Await the aggregate for up to `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> OperationResult<HashMap<String, T>> {
        let result = self.aggregate.wait_timeout(timeout).await;
        self.collect(result.status)
    }

    pub fn is_done(&self) -> bool {
        self.aggregate.is_done()
    }

    /// Request cancellation of every outstanding chunk (best effort).
    pub fn cancel(&self) {
        self.aggregate.cancel();
    }

    fn collect(&self, status: OperationStatus) -> OperationResult<HashMap<String, T>> {
        let values = self
            .results
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        OperationResult {
            value: Some(values),
            status,
            cas: None,
        }
    }
}

impl CacheClient {
    /// Fetch an arbitrary collection of keys in one call.
    ///
    /// Keys are validated up front (the whole call fails on the first bad
    /// key), grouped by destination, and fetched with one sub-operation per
    /// destination. Chunk callbacks may run concurrently on different
    /// transport threads; the last chunk to report completes the aggregate
    /// and records the one bulk timing sample.
    pub fn async_get_bulk<T>(
        &self,
        keys: impl IntoIterator<Item = impl Into<String>>,
        codec: Arc<dyn Codec<T>>,
    ) -> Result<BulkGetFuture<T>>
    where
        T: Send + Sync + 'static,
    {
        let _timer = ScopedTimer::new("client::async_get_bulk");

        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            validate_key(key)?;
        }

        // Break the fetch down into per-destination chunks, silently
        // omitting keys without a live destination.
        let mut chunks: HashMap<DestinationId, Vec<String>> = HashMap::new();
        for key in keys {
            match self.inner.transport.locate(&key) {
                Some(destination) if destination.active => {
                    chunks.entry(destination.id).or_default().push(key);
                }
                Some(destination) => {
                    debug!(key = %key, destination = destination.id, "destination inactive, omitting key");
                }
                None => {
                    debug!(key = %key, "no destination for key, omitting");
                }
            }
        }

        let results: Arc<DashMap<String, T>> = Arc::new(DashMap::new());
        let aggregate = OperationFuture::new("bulk", self.read_timeout());
        let rv = BulkGetFuture {
            results: results.clone(),
            aggregate: aggregate.clone(),
        };

        if chunks.is_empty() {
            aggregate.set_result(Some(()), OperationStatus::success());
            aggregate.signal_complete();
            return Ok(rv);
        }

        let pending = Arc::new(AtomicUsize::new(chunks.len()));
        for (destination, chunk_keys) in chunks {
            let callback = BulkChunkCallback {
                results: results.clone(),
                pending: pending.clone(),
                aggregate: aggregate.clone(),
                metrics: self.inner.metrics.clone(),
                codec: codec.clone(),
            };
            let op = Operation::new(
                OpCommand::Get { keys: chunk_keys },
                Box::new(callback),
                aggregate.cancellation_token(),
            );
            if let Err(e) = self.inner.transport.submit_to(destination, op) {
                warn!(destination, "bulk chunk submission failed: {}", e);
                complete_chunk(
                    &pending,
                    &aggregate,
                    &self.inner.metrics,
                    OperationStatus::new(StatusCode::Internal, e.to_string()),
                );
            }
        }
        Ok(rv)
    }
}

struct BulkChunkCallback<T> {
    results: Arc<DashMap<String, T>>,
    pending: Arc<AtomicUsize>,
    aggregate: OperationFuture<()>,
    metrics: Arc<MetricsRegistry>,
    codec: Arc<dyn Codec<T>>,
}

impl<T: Send + Sync + 'static> OperationCallback for BulkChunkCallback<T> {
    fn on_payload(&mut self, payload: OpPayload) {
        match payload {
            OpPayload::Value { key, flags, data } => {
                self.metrics
                    .data_size(BULK_OPERATION, READ)
                    .observe(data.len() as f64);
                match self.codec.decode(&CachedPayload::new(flags, data)) {
                    Ok(value) => {
                        // A repeated key across chunk callbacks overwrites.
                        self.results.insert(key, value);
                    }
                    Err(e) => debug!(key = %key, "failed to decode bulk value: {}", e),
                }
            }
            other => debug!(?other, "unexpected payload for bulk get"),
        }
    }

    fn on_terminal(self: Box<Self>, status: OperationStatus) {
        if !status.is_success() {
            debug!(code = %status.code, "bulk chunk finished without success");
        }
        complete_chunk(&self.pending, &self.aggregate, &self.metrics, status);
    }
}

/// Decrement the pending-chunk count; the exactly-one caller that observes
/// the zero crossing records the aggregate sample and signals completion.
fn complete_chunk(
    pending: &AtomicUsize,
    aggregate: &OperationFuture<()>,
    metrics: &MetricsRegistry,
    status: OperationStatus,
) {
    if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
        let timer = metrics.timer(BULK_OPERATION, READ, None, None);
        aggregate.set_result(Some(()), status);
        timer.observe(aggregate.elapsed().as_millis() as f64);
        aggregate.signal_complete();
    }
}
