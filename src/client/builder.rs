use std::sync::Arc;
use std::time::Duration;

use nanoid::nanoid;
use once_cell::sync::OnceCell;

use super::CacheClient;
use super::ClientConfig;
use super::ClientInner;
use crate::metrics::MetricsRegistry;
use crate::transport::Transport;

pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    metrics: Option<Arc<MetricsRegistry>>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new builder with default config around a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            metrics: None,
            config: ClientConfig::default(),
        }
    }

    /// Set the application name tagged on every metric (default: "gridcache")
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.config.app_name = app_name.into();
        self
    }

    /// Set the default waiter timeout (default: 2.5s)
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Set a dedicated waiter timeout for reads
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Set a dedicated waiter timeout for the blocking mutate wrapper
    pub fn mutate_timeout(mut self, timeout: Duration) -> Self {
        self.config.mutate_timeout = Some(timeout);
        self
    }

    /// Put the client in fire-and-forget mode (default: off)
    pub fn write_only(mut self, write_only: bool) -> Self {
        self.config.write_only = write_only;
        self
    }

    /// Supply a shared metrics registry; one is created from the app name
    /// when not provided
    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Completely replaces the default configuration
    pub fn set_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the client with current configuration
    pub fn build(self) -> CacheClient {
        let instance_id = nanoid!(10);
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsRegistry::new(&self.config.app_name, &instance_id)));
        CacheClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                metrics,
                config: self.config,
                instance_id,
                mutate_timeout: OnceCell::new(),
            }),
        }
    }
}
