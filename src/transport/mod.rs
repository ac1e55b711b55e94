//! Transport collaborator seam.
//!
//! The transport owns the wire protocol, the consistent-hashing locator and
//! the physical connections. The client only needs the operations below:
//! submit guarantees exactly one terminal callback per operation, and
//! destination lookup drives the bulk fan-out partitioning.

use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::errors::TransportError;
use crate::operation::Operation;

/// Identifies one physical destination (a cache node).
pub type DestinationId = u64;

/// A destination handle together with its connection liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub id: DestinationId,
    pub active: bool,
}

#[cfg_attr(test, automock)]
pub trait Transport: Send + Sync {
    /// Enqueue an operation, routed by its command's key. The transport
    /// invokes the operation's terminal callback exactly once.
    fn submit(&self, op: Operation) -> Result<(), TransportError>;

    /// Enqueue a pre-routed operation on a specific destination (bulk
    /// chunks). Same exactly-once terminal guarantee.
    fn submit_to(&self, destination: DestinationId, op: Operation) -> Result<(), TransportError>;

    /// Resolve a key's current destination, or `None` when the locator has no
    /// node for it.
    fn locate(&self, key: &str) -> Option<Destination>;

    /// The transport-wide operation timeout, used as a fallback for waits
    /// that have no dedicated configuration.
    fn operation_timeout(&self) -> Duration;

    /// Ask the transport to tear down and re-establish a destination's
    /// connection.
    fn queue_reconnect(&self, destination: DestinationId);
}
