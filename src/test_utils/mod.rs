//! Shared test doubles for the request drivers.
//!
//! `ScriptedTransport` hands every submitted operation to the test over a
//! channel so the test can play the transport's I/O thread: feed payloads,
//! then deliver the one terminal status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::errors::TransportError;
use crate::operation::OpPayload;
use crate::operation::Operation;
use crate::operation::OperationStatus;
use crate::transport::Destination;
use crate::transport::DestinationId;
use crate::transport::Transport;

/// One operation captured from a driver, with the route it was submitted on.
pub struct SubmittedOp {
    pub destination: Option<DestinationId>,
    pub op: Operation,
}

impl SubmittedOp {
    pub fn keys(&self) -> Vec<String> {
        match &self.op.command {
            crate::operation::OpCommand::Get { keys } => keys.clone(),
            other => vec![other.key().to_string()],
        }
    }

    /// Feed one payload, as the wire would ahead of the terminal status.
    pub fn payload(&mut self, payload: OpPayload) {
        self.op.callback.on_payload(payload);
    }

    /// Deliver the terminal status, consuming the operation.
    pub fn finish(self, status: OperationStatus) {
        self.op.callback.on_terminal(status);
    }
}

pub struct ScriptedTransport {
    tx: mpsc::UnboundedSender<SubmittedOp>,
    destinations: Mutex<HashMap<String, Destination>>,
    reconnects: Mutex<Vec<DestinationId>>,
    operation_timeout: Duration,
    reject_submits: Mutex<bool>,
}

impl ScriptedTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SubmittedOp>) {
        Self::with_timeout(Duration::from_millis(100))
    }

    pub fn with_timeout(
        operation_timeout: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SubmittedOp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                destinations: Mutex::new(HashMap::new()),
                reconnects: Mutex::new(Vec::new()),
                operation_timeout,
                reject_submits: Mutex::new(false),
            }),
            rx,
        )
    }

    pub fn map_key(&self, key: &str, destination: Destination) {
        self.destinations
            .lock()
            .insert(key.to_string(), destination);
    }

    pub fn reject_submits(&self, reject: bool) {
        *self.reject_submits.lock() = reject;
    }

    pub fn reconnects(&self) -> Vec<DestinationId> {
        self.reconnects.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn submit(&self, op: Operation) -> Result<(), TransportError> {
        if *self.reject_submits.lock() {
            return Err(TransportError::QueueFull);
        }
        self.tx
            .send(SubmittedOp {
                destination: None,
                op,
            })
            .map_err(|_| TransportError::Closed)
    }

    fn submit_to(&self, destination: DestinationId, op: Operation) -> Result<(), TransportError> {
        if *self.reject_submits.lock() {
            return Err(TransportError::QueueFull);
        }
        self.tx
            .send(SubmittedOp {
                destination: Some(destination),
                op,
            })
            .map_err(|_| TransportError::Closed)
    }

    fn locate(&self, key: &str) -> Option<Destination> {
        self.destinations.lock().get(key).copied()
    }

    fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    fn queue_reconnect(&self, destination: DestinationId) {
        self.reconnects.lock().push(destination);
    }
}
