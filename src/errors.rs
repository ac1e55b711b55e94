//! Cache Client Error Hierarchy
//!
//! Defines the error types surfaced synchronously by the client drivers,
//! categorized by the layer that produced them. Anything that happens after an
//! operation has been submitted is reported through the operation's future as
//! a typed outcome, never through these errors.

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Call-time key validation failures
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Value encode/decode failures
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Submission-path transport failures
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Key-format constraints enforced before any operation is submitted.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,

    #[error("key is {len} bytes, exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },

    #[error("key contains whitespace or control characters")]
    InvalidCharacters,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to decode payload with flags {flags}: {source}")]
    Decode {
        flags: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Destination resolved but currently not connected
    #[error("destination {0} is not connected")]
    DestinationDown(u64),

    /// Submission queue rejected the operation
    #[error("operation queue is full")]
    QueueFull,

    /// Transport has been shut down
    #[error("transport is closed")]
    Closed,
}
