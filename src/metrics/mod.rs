//! Per-operation metrics instrumentation.
//!
//! Every operation completion records one latency sample tagged with the
//! operation name, read/write direction, terminal status and, for reads,
//! hit-or-miss. Children of the underlying vectors are cached by their
//! composed name so the hot path is a lock-free map lookup; concurrent
//! first-time lookups may both create a child, which is harmless since
//! children of one vector are value-equal and last-writer-wins in the cache.
//!
//! The registry is an explicitly constructed object injected at client build
//! time. Nothing in this module is process-global.


use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use warp::Filter;

use crate::operation::OperationStatus;

const LABEL_NAMES: [&str; 4] = ["operation", "operation_type", "status", "cache_hit"];
const SIZE_LABEL_NAMES: [&str; 2] = ["operation", "operation_type"];

pub struct MetricsRegistry {
    registry: Registry,
    op_latency: HistogramVec,
    op_events: IntCounterVec,
    data_size: HistogramVec,
    timers: DashMap<String, Histogram>,
    counters: DashMap<String, IntCounter>,
    sizes: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    /// Build a registry carrying the client's identity as constant labels.
    pub fn new(app: &str, instance: &str) -> Self {
        let mut const_labels = HashMap::new();
        const_labels.insert("app".to_string(), app.to_string());
        const_labels.insert("instance".to_string(), instance.to_string());

        let registry = Registry::new();

        let op_latency = HistogramVec::new(
            HistogramOpts::new(
                "gridcache_operation_duration_ms",
                "Histogram of cache operation latency in ms",
            )
            .const_labels(const_labels.clone())
            .buckets(exponential_buckets(1.0, 2.0, 12).unwrap()),
            &LABEL_NAMES,
        )
        .expect("metric can not be created");

        let op_events = IntCounterVec::new(
            Opts::new(
                "gridcache_operation_events_total",
                "Count of discrete cache operation events",
            )
            .const_labels(const_labels.clone()),
            &LABEL_NAMES,
        )
        .expect("metric can not be created");

        let data_size = HistogramVec::new(
            HistogramOpts::new(
                "gridcache_data_size_bytes",
                "Histogram of returned payload sizes in bytes",
            )
            .const_labels(const_labels)
            .buckets(exponential_buckets(10.0, 5.0, 10).unwrap()),
            &SIZE_LABEL_NAMES,
        )
        .expect("metric can not be created");

        registry
            .register(Box::new(op_latency.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(op_events.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(data_size.clone()))
            .expect("collector can be registered");

        Self {
            registry,
            op_latency,
            op_events,
            data_size,
            timers: DashMap::new(),
            counters: DashMap::new(),
            sizes: DashMap::new(),
        }
    }

    /// Latency histogram for `(operation, status?, hit?)`. Status is keyed by
    /// its code so name cardinality stays bounded by the operation
    /// vocabulary.
    pub fn timer(
        &self,
        operation: &str,
        operation_type: &str,
        status: Option<&OperationStatus>,
        hit: Option<&str>,
    ) -> Histogram {
        let name = Self::entry_name(operation, status, hit);
        if let Some(timer) = self.timers.get(&name) {
            return timer.clone();
        }

        let status_label = status.map(|s| s.code.to_string()).unwrap_or_default();
        let timer = self.op_latency.with_label_values(&[
            operation,
            operation_type,
            &status_label,
            hit.unwrap_or(""),
        ]);
        self.timers.insert(name, timer.clone());
        timer
    }

    /// Event counter for `(operation, status?, hit?)`.
    pub fn event_counter(
        &self,
        operation: &str,
        operation_type: &str,
        status: Option<&OperationStatus>,
        hit: Option<&str>,
    ) -> IntCounter {
        let name = Self::entry_name(operation, status, hit);
        if let Some(counter) = self.counters.get(&name) {
            return counter.clone();
        }

        let status_label = status.map(|s| s.code.to_string()).unwrap_or_default();
        let counter = self.op_events.with_label_values(&[
            operation,
            operation_type,
            &status_label,
            hit.unwrap_or(""),
        ]);
        self.counters.insert(name, counter.clone());
        counter
    }

    /// Payload size distribution for one operation.
    pub fn data_size(&self, operation: &str, operation_type: &str) -> Histogram {
        if let Some(summary) = self.sizes.get(operation) {
            return summary.clone();
        }

        let summary = self
            .data_size
            .with_label_values(&[operation, operation_type]);
        self.sizes.insert(operation.to_string(), summary.clone());
        summary
    }

    fn entry_name(operation: &str, status: Option<&OperationStatus>, hit: Option<&str>) -> String {
        let mut name = operation.to_string();
        if let Some(status) = status {
            name.push_str(&status.code.to_string());
        }
        if let Some(hit) = hit {
            name.push_str(hit);
        }
        name
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!("could not encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_else(|e| {
            error!("metrics could not be from_utf8'd: {}", e);
            String::default()
        })
    }
}

/// Serve the registry on `/metrics` until the shutdown signal fires.
pub async fn start_server(
    registry: Arc<MetricsRegistry>,
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let metrics_route = warp::path!("metrics").map(move || registry.render());

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}
