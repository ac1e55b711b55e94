//! Client module for the distributed cache
//!
//! Provides the entry point and the per-operation request drivers:
//! - [`CacheClient`] - Main entry point, one instance per physical client
//! - [`ClientBuilder`] - Configurable client construction
//! - [`BulkGetFuture`] - Aggregate handle returned by bulk gets
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gridcache::{CacheClient, StringCodec};
//! # fn transport() -> Arc<dyn gridcache::Transport> { unimplemented!() }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = CacheClient::builder(transport())
//!         .app_name("profiles")
//!         .operation_timeout(Duration::from_millis(500))
//!         .build();
//!
//!     let codec = Arc::new(StringCodec);
//!     let future = client
//!         .set("user:1001", 300, &"Alice".to_string(), &StringCodec, None)
//!         .unwrap();
//!     assert!(future.wait().await.is_success());
//!
//!     let value = client.async_get("user:1001", codec).unwrap().wait().await;
//!     println!("User data: {:?}", value.value);
//! }
//! ```

mod builder;
mod bulk;
mod concat;
mod config;
mod get;
mod key;
mod mutate;
mod scoped_timer;
mod store;

pub use builder::*;
pub use bulk::*;
pub use config::*;

pub(crate) use key::validate_key;
pub(crate) use scoped_timer::ScopedTimer;

#[cfg(test)]
mod concat_test;
#[cfg(test)]
mod get_test;
#[cfg(test)]
mod store_test;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::constants::RECONNECT_OPERATION;
use crate::constants::WRITE;
use crate::metrics::MetricsRegistry;
use crate::operation::CompletionLatch;
use crate::operation::OperationFuture;
use crate::transport::Destination;
use crate::transport::DestinationId;
use crate::transport::Transport;

/// Main entry point for issuing cache operations.
///
/// Holds the transport seam, the injected metrics registry and the client
/// configuration. Every driver is non-blocking: it validates its inputs,
/// submits one operation and immediately returns a future; the transport's
/// I/O tasks complete that future asynchronously.
///
/// Created through the [`builder()`](CacheClient::builder) method.
#[derive(Clone)]
pub struct CacheClient {
    pub(super) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) metrics: Arc<MetricsRegistry>,
    pub(crate) config: ClientConfig,
    pub(crate) instance_id: String,
    pub(crate) mutate_timeout: OnceCell<Duration>,
}

impl CacheClient {
    /// Create a configured client builder around a transport.
    pub fn builder(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The injected metrics registry, for export wiring.
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.inner.metrics
    }

    /// Resolve the destination currently serving `key`.
    pub fn destination_for(&self, key: &str) -> Option<Destination> {
        self.inner.transport.locate(key)
    }

    /// Record a reconnect event for a destination and hand it to the
    /// transport's reconnect queue.
    pub fn note_reconnect(&self, destination: DestinationId) {
        self.inner
            .metrics
            .event_counter(RECONNECT_OPERATION, WRITE, None, None)
            .inc();
        debug!(destination, "queueing destination reconnect");
        self.inner.transport.queue_reconnect(destination);
    }

    /// Attach a mutating operation's future to the caller-supplied latch.
    /// Write-only clients are fire-and-forget and never attach.
    pub(crate) fn attach_to_latch<T: Send + 'static>(
        &self,
        latch: Option<&CompletionLatch>,
        future: &OperationFuture<T>,
    ) {
        if let Some(latch) = latch {
            if !self.inner.config.write_only {
                latch.attach(future);
            }
        }
    }

    /// Waiter timeout for read operations.
    pub(crate) fn read_timeout(&self) -> Duration {
        self.inner
            .config
            .read_timeout
            .unwrap_or(self.inner.config.operation_timeout)
    }

    /// Waiter timeout for everything else.
    pub(crate) fn operation_timeout(&self) -> Duration {
        self.inner.config.operation_timeout
    }

    /// Waiter timeout for the blocking mutate wrapper. Resolved once per
    /// client and cached: config override first, transport fallback second.
    pub(crate) fn mutate_timeout(&self) -> Duration {
        *self.inner.mutate_timeout.get_or_init(|| {
            self.inner
                .config
                .mutate_timeout
                .unwrap_or_else(|| self.inner.transport.operation_timeout())
        })
    }
}

impl fmt::Display for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.inner.config.app_name, self.inner.instance_id
        )
    }
}
