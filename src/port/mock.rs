//! Mock serial host for testing.
//!
//! [`MockSerialHost`] plays both collaborator roles: it enumerates a
//! configurable port list and opens [`MockSerialPort`] transports. Tests keep
//! a clone of the host to reach the ports it opened, push inbound data into
//! them and inspect what was written.

use super::error::PortError;
use super::traits::{
    event_channel, EventSender, HostEnumeration, OpenedTransport, SerialTransport,
    TransportEvent, TransportFactory,
};
use crate::types::OpenOptions;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Inner state of a mock port, protected by a mutex for interior mutability.
#[derive(Debug, Default)]
struct MockPortState {
    /// Log of all payloads written to the port.
    write_log: Vec<Vec<u8>>,
    /// Whether writes should fail.
    fail_writes: bool,
    /// Whether flushes should fail.
    fail_flush: bool,
    /// Whether close should fail.
    fail_close: bool,
    /// Number of successful flushes.
    flush_count: usize,
    /// Whether close has been called.
    closed: bool,
}

/// Mock transport for one opened port.
///
/// # Example
/// ```
/// use serial_handle_api::port::{MockSerialHost, TransportFactory};
/// use serial_handle_api::OpenOptions;
///
/// let host = MockSerialHost::new();
/// let opened = host.open("MOCK0", &OpenOptions::with_bitrate(9600));
/// let port = host.last_opened().unwrap();
/// assert_eq!(port.name(), "MOCK0");
/// assert_eq!(port.options().bitrate, Some(9600));
/// # drop(opened);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    options: OpenOptions,
    events: EventSender,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    fn new(name: &str, options: &OpenOptions, events: EventSender) -> Self {
        Self {
            name: name.to_string(),
            options: options.clone(),
            events,
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Port name this transport was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options this transport was opened with.
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Emit the open event.
    pub fn signal_open(&self) {
        let _ = self.events.send(TransportEvent::Opened);
    }

    /// Emit a data event, as if the device had sent `data`.
    pub fn push_inbound(&self, data: &[u8]) {
        let _ = self.events.send(TransportEvent::Data(data.to_vec()));
    }

    /// Emit an error event.
    pub fn push_error(&self, error: PortError) {
        let _ = self.events.send(TransportEvent::Error(error));
    }

    /// Get a copy of all payloads written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make subsequent flushes fail.
    pub fn set_fail_flush(&self, fail: bool) {
        self.state.lock().fail_flush = fail;
    }

    /// Make close fail.
    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Number of successful flushes.
    pub fn flush_count(&self) -> usize {
        self.state.lock().flush_count
    }

    /// Whether close has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl SerialTransport for MockSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::Closed);
        }
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    async fn flush(&self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::Closed);
        }
        if state.fail_flush {
            return Err(PortError::config("mock flush failure"));
        }
        state.flush_count += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::Closed);
        }
        state.closed = true;
        if state.fail_close {
            return Err(PortError::config("mock close failure"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Debug)]
struct MockHostState {
    /// Port names in host enumeration order.
    ports: Vec<String>,
    /// Whether enumeration should fail.
    fail_enumeration: bool,
    /// Port names whose open fails.
    failing_ports: HashSet<String>,
    /// Whether opens emit `Opened` immediately.
    auto_open: bool,
    /// Every port opened so far, in open order.
    opened: Vec<MockSerialPort>,
}

/// Mock host: enumerates ports and opens mock transports.
#[derive(Clone, Debug)]
pub struct MockSerialHost {
    state: Arc<Mutex<MockHostState>>,
}

impl Default for MockSerialHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSerialHost {
    /// Create a host with no ports whose opens succeed immediately.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockHostState {
                ports: Vec::new(),
                fail_enumeration: false,
                failing_ports: HashSet::new(),
                auto_open: true,
                opened: Vec::new(),
            })),
        }
    }

    /// Create a host that enumerates the given ports in this order.
    pub fn with_ports<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = Self::new();
        host.state.lock().ports = ports.into_iter().map(Into::into).collect();
        host
    }

    /// Make enumeration fail.
    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    /// Make opens of `port_name` fail with `NotFound`.
    pub fn fail_open(&self, port_name: impl Into<String>) {
        self.state.lock().failing_ports.insert(port_name.into());
    }

    /// When false, opens wait for [`MockSerialPort::signal_open`].
    pub fn set_auto_open(&self, auto_open: bool) {
        self.state.lock().auto_open = auto_open;
    }

    /// All ports opened so far, in open order.
    pub fn opened(&self) -> Vec<MockSerialPort> {
        self.state.lock().opened.clone()
    }

    /// The most recently opened port.
    pub fn last_opened(&self) -> Option<MockSerialPort> {
        self.state.lock().opened.last().cloned()
    }
}

impl TransportFactory for MockSerialHost {
    fn open(&self, port_name: &str, options: &OpenOptions) -> OpenedTransport {
        let (tx, rx) = event_channel();
        let port = MockSerialPort::new(port_name, options, tx);

        let mut state = self.state.lock();
        if state.failing_ports.contains(port_name) {
            port.push_error(PortError::not_found(port_name));
        } else if state.auto_open {
            port.signal_open();
        }
        state.opened.push(port.clone());

        OpenedTransport {
            transport: Arc::new(port),
            events: rx,
        }
    }
}

#[async_trait]
impl HostEnumeration for MockSerialHost {
    async fn available_ports(&self) -> Result<Vec<String>, PortError> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(PortError::Io(std::io::Error::other("mock enumeration failure")));
        }
        Ok(state.ports.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_emits_opened_then_data() {
        let host = MockSerialHost::new();
        let mut opened = host.open("MOCK0", &OpenOptions::default());
        let port = host.last_opened().unwrap();
        port.push_inbound(b"Hello");

        assert!(matches!(opened.events.recv().await, Some(TransportEvent::Opened)));
        match opened.events.recv().await {
            Some(TransportEvent::Data(data)) => assert_eq!(data, b"Hello"),
            other => panic!("Expected data event, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_open_emits_error() {
        let host = MockSerialHost::new();
        host.fail_open("COM9");
        let mut opened = host.open("COM9", &OpenOptions::default());

        match opened.events.recv().await {
            Some(TransportEvent::Error(PortError::NotFound(name))) => assert_eq!(name, "COM9"),
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_logging() {
        let host = MockSerialHost::new();
        let opened = host.open("MOCK0", &OpenOptions::default());
        opened.transport.write(b"Test1").await.unwrap();
        opened.transport.write(b"Test2").await.unwrap();

        let log = host.last_opened().unwrap().get_write_log();
        assert_eq!(log, vec![b"Test1".to_vec(), b"Test2".to_vec()]);
    }

    #[tokio::test]
    async fn test_write_failure() {
        let host = MockSerialHost::new();
        let opened = host.open("MOCK0", &OpenOptions::default());
        host.last_opened().unwrap().set_fail_writes(true);

        assert!(opened.transport.write(b"x").await.is_err());
        assert!(host.last_opened().unwrap().get_write_log().is_empty());
    }

    #[tokio::test]
    async fn test_close_then_operations_fail() {
        let host = MockSerialHost::new();
        let opened = host.open("MOCK0", &OpenOptions::default());
        opened.transport.close().await.unwrap();

        assert!(host.last_opened().unwrap().is_closed());
        assert!(matches!(opened.transport.write(b"x").await, Err(PortError::Closed)));
        assert!(matches!(opened.transport.flush().await, Err(PortError::Closed)));
    }

    #[tokio::test]
    async fn test_enumeration() {
        let host = MockSerialHost::with_ports(["A", "B"]);
        assert_eq!(host.available_ports().await.unwrap(), vec!["A", "B"]);

        host.set_fail_enumeration(true);
        assert!(host.available_ports().await.is_err());
    }
}
