//! Operation primitives for the async cache client
//!
//! Provides the building blocks the request drivers compose:
//! - [`Operation`] - One unit of work handed to the transport
//! - [`OperationCallback`] - The two-point completion state machine
//! - [`OperationStatus`] / [`StatusCode`] - Typed protocol outcomes
//! - [`OperationFuture`] - Completion handle returned to callers
//! - [`CompletionLatch`] - Threshold signalling over a set of futures

mod future;
mod latch;

pub use future::*;
pub use latch::*;


use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Terminal outcome classes reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    NotFound,
    Exists,
    NotStored,
    TooLarge,
    Invalid,
    TempFail,
    Internal,
    /// A waiter gave up before the operation completed. The operation itself
    /// keeps running.
    Timeout,
    Cancelled,
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Exists => "EXISTS",
            StatusCode::NotStored => "NOT_STORED",
            StatusCode::TooLarge => "TOO_LARGE",
            StatusCode::Invalid => "INVALID",
            StatusCode::TempFail => "TEMP_FAIL",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Outcome of one operation as reported by its terminal callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    pub code: StatusCode,
    pub message: String,
}

impl OperationStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(StatusCode::Success, "")
    }

    pub fn timed_out() -> Self {
        Self::new(StatusCode::Timeout, "waiter timed out")
    }

    pub fn cancelled() -> Self {
        Self::new(StatusCode::Cancelled, "cancelled")
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Store operation flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Set,
    Add,
    Replace,
}

/// Concatenation flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatKind {
    Append,
    Prepend,
}

/// Counter mutation flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateKind {
    Incr,
    Decr,
}

/// Entry expiration in seconds. Zero means no expiration.
pub type Expiration = u32;

/// The unit of work described to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpCommand {
    Get {
        keys: Vec<String>,
    },
    GetAndTouch {
        key: String,
        expiration: Expiration,
    },
    Store {
        kind: StoreKind,
        key: String,
        flags: u32,
        expiration: Expiration,
        data: Vec<u8>,
    },
    Delete {
        key: String,
    },
    Touch {
        key: String,
        expiration: Expiration,
    },
    Concat {
        kind: ConcatKind,
        key: String,
        data: Vec<u8>,
    },
    Mutate {
        kind: MutateKind,
        key: String,
        delta: u64,
        default: u64,
        expiration: Expiration,
    },
}

impl OpCommand {
    /// Routing key for single-destination commands. Multi-key gets are routed
    /// per chunk by the caller and report their first key here.
    pub fn key(&self) -> &str {
        match self {
            OpCommand::Get { keys } => keys.first().map(String::as_str).unwrap_or(""),
            OpCommand::GetAndTouch { key, .. } => key,
            OpCommand::Store { key, .. } => key,
            OpCommand::Delete { key } => key,
            OpCommand::Touch { key, .. } => key,
            OpCommand::Concat { key, .. } => key,
            OpCommand::Mutate { key, .. } => key,
        }
    }
}

/// Data arriving off the wire ahead of the terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpPayload {
    /// A value for `key` (plain get and bulk get).
    Value {
        key: String,
        flags: u32,
        data: Vec<u8>,
    },
    /// A value plus its version token (get-and-touch).
    ValueCas {
        key: String,
        cas: u64,
        flags: u32,
        data: Vec<u8>,
    },
    /// A bare version token (store, delete).
    Cas(u64),
    /// The post-mutation counter value.
    Counter(u64),
}

/// Completion state machine for one operation.
///
/// The transport invokes `on_payload` zero or more times as data arrives, then
/// `on_terminal` exactly once. `on_terminal` consumes the callback, so a
/// second terminal delivery is unrepresentable.
pub trait OperationCallback: Send {
    fn on_payload(&mut self, payload: OpPayload);

    fn on_terminal(self: Box<Self>, status: OperationStatus);
}

/// One request/response unit submitted to the transport.
///
/// Created by a driver, submitted once, owned by the transport afterwards.
/// The driver keeps only the cancellation token as an advisory handle; firing
/// it does not stop work the transport has already started flushing.
pub struct Operation {
    pub command: OpCommand,
    pub callback: Box<dyn OperationCallback>,
    pub cancel: CancellationToken,
}

impl Operation {
    pub fn new(
        command: OpCommand,
        callback: Box<dyn OperationCallback>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            command,
            callback,
            cancel,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("command", &self.command)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// A decoded value together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasValue<T> {
    pub cas: u64,
    pub value: T,
}

/// Default waiter timeout applied when a future is built without one.
pub(crate) const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(2500);
