//! Asynchronous operation layer for a distributed key-value cache client.
//!
//! Turns raw per-connection protocol callbacks into composable futures that
//! application code can await, cancel, time out, and observe via metrics.
//! The wire protocol, node location, connection lifecycle and value
//! serialization live behind the [`Transport`] and [`Codec`] seams.

mod client;
mod codec;
mod constants;
mod errors;
mod metrics;
mod operation;
mod transport;

pub use client::*;
pub use codec::*;
pub use errors::*;
pub use metrics::*;
pub use operation::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
