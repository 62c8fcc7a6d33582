//! Host serial ports through the `serialport` crate.
//!
//! Each opened port gets a dedicated reader thread that polls the device with
//! the configured timeout and forwards every chunk as a [`TransportEvent`].
//! Writes, flushes and closes run on the blocking pool against a cloned
//! handle, so the async runtime never blocks on the device.

use super::error::PortError;
use super::traits::{
    event_channel, EventSender, HostEnumeration, OpenedTransport, PortConfiguration,
    SerialTransport, TransportEvent, TransportFactory,
};
use crate::config::SerialConfig;
use crate::types::OpenOptions;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

type SharedPort = Arc<Mutex<Option<Box<dyn serialport::SerialPort>>>>;

/// Settings shared by every port the system backend opens.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Baud rate used when the caller gives no bitrate.
    pub default_baud: u32,
    /// Upper bound on a single blocking device read.
    pub read_timeout: Duration,
    /// Size of the reader thread's scratch buffer.
    pub read_chunk_size: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            default_baud: 9600,
            read_timeout: Duration::from_millis(100),
            read_chunk_size: 1024,
        }
    }
}

impl From<&SerialConfig> for TransportSettings {
    fn from(config: &SerialConfig) -> Self {
        Self {
            default_baud: config.default_bitrate,
            read_timeout: config.read_timeout(),
            read_chunk_size: config.read_chunk_size.max(1),
        }
    }
}

/// Transport factory and host enumeration backed by real devices.
#[derive(Debug, Clone, Default)]
pub struct SystemSerial {
    settings: TransportSettings,
}

impl SystemSerial {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }
}

impl TransportFactory for SystemSerial {
    fn open(&self, port_name: &str, options: &OpenOptions) -> OpenedTransport {
        let (events, rx) = event_channel();
        let transport = SystemTransport::new(port_name);

        match PortConfiguration::from_options(
            options,
            self.settings.default_baud,
            self.settings.read_timeout,
        ) {
            Ok(config) => {
                let reader = ReaderTask {
                    port_name: port_name.to_string(),
                    config,
                    chunk_size: self.settings.read_chunk_size,
                    writer: Arc::clone(&transport.port),
                    running: Arc::clone(&transport.running),
                    events: events.clone(),
                };
                let spawned = thread::Builder::new()
                    .name(format!("serial-reader-{port_name}"))
                    .spawn(move || reader.run());
                if let Err(e) = spawned {
                    let _ = events.send(TransportEvent::Error(PortError::Io(e)));
                }
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e));
            }
        }

        OpenedTransport {
            transport: Arc::new(transport),
            events: rx,
        }
    }
}

#[async_trait]
impl HostEnumeration for SystemSerial {
    async fn available_ports(&self) -> Result<Vec<String>, PortError> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| PortError::Io(std::io::Error::other(e)))??;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

/// Opens the device, then pumps reads into the event stream until stopped.
struct ReaderTask {
    port_name: String,
    config: PortConfiguration,
    chunk_size: usize,
    writer: SharedPort,
    running: Arc<AtomicBool>,
    events: EventSender,
}

impl ReaderTask {
    fn run(self) {
        let mut port = match self.open() {
            Ok(port) => port,
            Err(e) => {
                let _ = self.events.send(TransportEvent::Error(e));
                return;
            }
        };

        if !self.running.load(Ordering::Acquire) {
            debug!(port = %self.port_name, "closed before open completed");
            return;
        }
        let _ = self.events.send(TransportEvent::Opened);

        let mut buffer = vec![0u8; self.chunk_size];
        while self.running.load(Ordering::Acquire) {
            match port.read(&mut buffer) {
                Ok(0) => continue,
                Ok(n) => {
                    if self
                        .events
                        .send(TransportEvent::Data(buffer[..n].to_vec()))
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    if self.running.load(Ordering::Acquire) {
                        let _ = self.events.send(TransportEvent::Error(PortError::Io(e)));
                    }
                    break;
                }
            }
        }
        debug!(port = %self.port_name, "reader stopped");
    }

    fn open(&self) -> Result<Box<dyn serialport::SerialPort>, PortError> {
        let port = serialport::new(&self.port_name, self.config.baud_rate)
            .data_bits(self.config.data_bits.into())
            .flow_control(self.config.flow_control.into())
            .parity(self.config.parity.into())
            .stop_bits(self.config.stop_bits.into())
            .timeout(self.config.timeout)
            .open()
            .map_err(|e| PortError::from_open(&self.port_name, e))?;

        let writer = port.try_clone().map_err(PortError::Serial)?;
        *self.writer.lock() = Some(writer);
        Ok(port)
    }
}

/// Handle to one device opened by [`SystemSerial`].
pub struct SystemTransport {
    name: String,
    port: SharedPort,
    running: Arc<AtomicBool>,
}

impl SystemTransport {
    fn new(port_name: &str) -> Self {
        Self {
            name: port_name.to_string(),
            port: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    async fn with_port<T, F>(&self, op: F) -> Result<T, PortError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn serialport::SerialPort) -> Result<T, PortError> + Send + 'static,
    {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock();
            let port = guard.as_mut().ok_or(PortError::Closed)?;
            op(port.as_mut())
        })
        .await
        .map_err(|e| PortError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl SerialTransport for SystemTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, data: &[u8]) -> Result<usize, PortError> {
        let data = data.to_vec();
        self.with_port(move |port| {
            port.write_all(&data)?;
            port.flush()?;
            Ok(data.len())
        })
        .await
    }

    async fn flush(&self) -> Result<(), PortError> {
        self.with_port(|port| {
            port.clear(serialport::ClearBuffer::All)
                .map_err(PortError::Serial)
        })
        .await
    }

    async fn close(&self) -> Result<(), PortError> {
        self.running.store(false, Ordering::Release);
        let port = Arc::clone(&self.port);
        let taken = tokio::task::spawn_blocking(move || port.lock().take())
            .await
            .map_err(|e| PortError::Io(std::io::Error::other(e)))?;
        match taken {
            Some(_) => Ok(()),
            None => Err(PortError::Closed),
        }
    }
}

impl Drop for SystemTransport {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(mut guard) = self.port.try_lock() {
            guard.take();
        } else {
            warn!(port = %self.name, "port busy during drop; reader will release it");
        }
    }
}

impl std::fmt::Debug for SystemTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemTransport")
            .field("name", &self.name)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_missing_port_reports_error_event() {
        let backend = SystemSerial::default();
        let mut opened = backend.open("/dev/nonexistent_port_12345", &OpenOptions::default());

        match opened.events.recv().await {
            Some(TransportEvent::Error(_)) => {}
            other => panic!("Expected open error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_option_reports_config_error() {
        let backend = SystemSerial::default();
        let options = OpenOptions::default().option("parity", json!("mark"));
        let mut opened = backend.open("/dev/nonexistent_port_12345", &options);

        match opened.events.recv().await {
            Some(TransportEvent::Error(PortError::Config(msg))) => assert!(msg.contains("parity")),
            other => panic!("Expected config error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_operations_before_open_fail_closed() {
        let transport = SystemTransport::new("/dev/nonexistent_port_12345");
        assert!(matches!(transport.write(b"x").await, Err(PortError::Closed)));
        assert!(matches!(transport.flush().await, Err(PortError::Closed)));
        assert!(matches!(transport.close().await, Err(PortError::Closed)));
    }

    #[test]
    fn test_settings_from_config() {
        let config = SerialConfig {
            default_bitrate: 115200,
            read_timeout_ms: 25,
            read_chunk_size: 0,
            ..SerialConfig::default()
        };
        let settings = TransportSettings::from(&config);
        assert_eq!(settings.default_baud, 115200);
        assert_eq!(settings.read_timeout, Duration::from_millis(25));
        assert_eq!(settings.read_chunk_size, 1);
    }
}
