//! One open port session.
//!
//! A [`Connection`] owns the transport handle and the inbound FIFO buffer.
//! A per-connection pump task drains the transport's event stream in order,
//! appending data events to the buffer; reads take from the front.
//!
//! The inbound buffer is unbounded. Data the caller never reads accumulates
//! for as long as the connection stays open.

use crate::codec;
use crate::port::{OpenedTransport, PortError, SerialTransport, TransportEvent};
use crate::types::{ConnectionId, ReadInfo, WriteInfo};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Resolves once the transport reports the outcome of its open.
pub type OpenSignal = oneshot::Receiver<Result<(), PortError>>;

/// FIFO byte buffer shared between a connection and its pump task.
#[derive(Debug, Clone, Default)]
pub struct InboundBuffer {
    bytes: Arc<Mutex<VecDeque<u8>>>,
}

impl InboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk at the tail.
    pub fn append(&self, chunk: &[u8]) {
        codec::append(&mut self.bytes.lock(), chunk);
    }

    /// Remove and return up to `max` bytes from the front.
    pub fn take(&self, max: usize) -> Vec<u8> {
        codec::take_front(&mut self.bytes.lock(), max)
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

/// A live session bound to one open port.
pub struct Connection {
    id: ConnectionId,
    port_name: String,
    inbound: InboundBuffer,
    transport: Arc<dyn SerialTransport>,
    pump: JoinHandle<()>,
}

impl Connection {
    /// Wrap an opening transport and start pumping its events.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(id: ConnectionId, port_name: &str, opened: OpenedTransport) -> (Self, OpenSignal) {
        let OpenedTransport { transport, events } = opened;
        let inbound = InboundBuffer::new();
        let (open_tx, open_rx) = oneshot::channel();

        info!(connection = %id, port = port_name, "Opening connection");
        let pump = tokio::spawn(pump_events(
            id,
            port_name.to_string(),
            inbound.clone(),
            events,
            open_tx,
        ));

        let connection = Self {
            id,
            port_name: port_name.to_string(),
            inbound,
            transport,
            pump,
        };
        (connection, open_rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Number of bytes waiting to be read.
    pub fn buffered_len(&self) -> usize {
        self.inbound.len()
    }

    /// Append inbound bytes to the tail of the buffer.
    ///
    /// The event pump delivers transport data through the same path.
    pub fn on_inbound_data(&self, bytes: &[u8]) {
        ingest(self.id, &self.port_name, &self.inbound, bytes);
    }

    /// Take up to `max_bytes` from the front of the buffer.
    ///
    /// Never waits for data: an empty buffer or `max_bytes == 0` yields an
    /// empty result, which is a valid poll.
    pub fn read(&self, max_bytes: usize) -> ReadInfo {
        let data = self.inbound.take(max_bytes);
        // Polling reads are frequent; only log the ones that returned data.
        if !data.is_empty() {
            debug!(
                connection = %self.id,
                port = %self.port_name,
                requested = max_bytes,
                dump = %codec::dump(&data),
                "read"
            );
        }
        ReadInfo::new(data)
    }

    /// Forward `bytes` to the transport in a single attempt.
    pub async fn write(&self, bytes: &[u8]) -> WriteInfo {
        debug!(connection = %self.id, port = %self.port_name, dump = %codec::dump(bytes), "write");
        match self.transport.write(bytes).await {
            Ok(written) => {
                debug!(connection = %self.id, "Bytes written: {}", written);
                WriteInfo::written(written)
            }
            Err(e) => {
                error!(
                    connection = %self.id,
                    port = %self.port_name,
                    "Error writing to the port: {}",
                    e
                );
                WriteInfo::failed()
            }
        }
    }

    /// Ask the transport to discard pending device buffers.
    pub async fn flush(&self) -> bool {
        debug!(connection = %self.id, port = %self.port_name, "flush");
        match self.transport.flush().await {
            Ok(()) => true,
            Err(e) => {
                error!(connection = %self.id, port = %self.port_name, "Error flushing: {}", e);
                false
            }
        }
    }

    /// Close the transport. Failures are logged and otherwise ignored.
    pub async fn close(&self) {
        if let Err(e) = self.transport.close().await {
            error!(
                connection = %self.id,
                port = %self.port_name,
                "Error closing connection: {}",
                e
            );
        }
        self.pump.abort();
        info!(connection = %self.id, port = %self.port_name, "Connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("port_name", &self.port_name)
            .field("buffered", &self.inbound.len())
            .finish()
    }
}

fn ingest(id: ConnectionId, port_name: &str, inbound: &InboundBuffer, bytes: &[u8]) {
    debug!(connection = %id, port = port_name, dump = %codec::dump(bytes), "onData");
    inbound.append(bytes);
}

/// Consume transport events in arrival order.
///
/// The first `Opened` or `Error` settles the pending open. Later errors are
/// only logged. If the stream ends before either, the open fails as closed.
async fn pump_events(
    id: ConnectionId,
    port_name: String,
    inbound: InboundBuffer,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    open_tx: oneshot::Sender<Result<(), PortError>>,
) {
    let mut open_tx = Some(open_tx);

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Opened => {
                if let Some(tx) = open_tx.take() {
                    info!(connection = %id, port = %port_name, "Port open");
                    let _ = tx.send(Ok(()));
                }
            }
            TransportEvent::Data(chunk) => ingest(id, &port_name, &inbound, &chunk),
            TransportEvent::Error(e) => match open_tx.take() {
                Some(tx) => {
                    error!(connection = %id, port = %port_name, "Error opening port: {}", e);
                    let _ = tx.send(Err(e));
                }
                None => error!(connection = %id, port = %port_name, "Error on port: {}", e),
            },
        }
    }

    if let Some(tx) = open_tx.take() {
        let _ = tx.send(Err(PortError::Closed));
    }
    debug!(connection = %id, port = %port_name, "event stream ended");
}
