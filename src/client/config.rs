use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Application name carried on every metric.
    pub app_name: String,

    /// Default waiter timeout for operation futures.
    pub operation_timeout: Duration,

    /// Dedicated waiter timeout for reads; falls back to
    /// `operation_timeout` when unset.
    pub read_timeout: Option<Duration>,

    /// Dedicated waiter timeout for the blocking mutate wrapper; falls back
    /// to the transport's operation timeout when unset.
    pub mutate_timeout: Option<Duration>,

    /// Fire-and-forget mode: mutating calls are never attached to latches.
    pub write_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            app_name: "gridcache".to_string(),
            operation_timeout: Duration::from_millis(2500),
            read_timeout: None,
            mutate_timeout: None,
            write_only: false,
        }
    }
}
