//! Core traits for the serial transport collaborator.
//!
//! A transport is opened through a [`TransportFactory`], which hands back the
//! transport handle together with the ordered stream of events it produces.
//! Both the real `serialport` backend and the mock implement these traits so
//! the connection layer never depends on a concrete device.

use super::error::PortError;
use crate::types::OpenOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Event produced by an open transport, delivered in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// The underlying device is open and ready for I/O.
    Opened,
    /// A chunk of bytes arrived from the device.
    Data(Vec<u8>),
    /// The transport failed. Before `Opened` this means the open failed.
    Error(PortError),
}

/// Sending half of a transport event stream.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a transport event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create an event stream. Unbounded: inbound data is never throttled.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Asynchronous operations on one open serial device.
///
/// Methods take `&self` because the handle is shared between the connection
/// and any in-flight operation; implementations use interior mutability.
#[async_trait]
pub trait SerialTransport: Send + Sync + std::fmt::Debug {
    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Write bytes to the device.
    ///
    /// Returns the count the transport reports as written.
    async fn write(&self, data: &[u8]) -> Result<usize, PortError>;

    /// Discard pending unsent and unread data in the device buffers.
    async fn flush(&self) -> Result<(), PortError>;

    /// Close the device. Further operations fail with [`PortError::Closed`].
    async fn close(&self) -> Result<(), PortError>;
}

/// A transport handle plus the event stream it feeds.
#[derive(Debug)]
pub struct OpenedTransport {
    pub transport: Arc<dyn SerialTransport>,
    pub events: EventReceiver,
}

/// Opens transports by port name.
pub trait TransportFactory: Send + Sync {
    /// Start opening `port_name`.
    ///
    /// This never fails synchronously: the outcome of the open is reported as
    /// the first event on the returned stream (`Opened` or `Error`).
    fn open(&self, port_name: &str, options: &OpenOptions) -> OpenedTransport;
}

/// Lists the serial ports the host currently presents.
#[async_trait]
pub trait HostEnumeration: Send + Sync {
    /// Port names in host enumeration order.
    async fn available_ports(&self) -> Result<Vec<String>, PortError>;
}

/// Configuration parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// How long a single device read may block before polling again.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(100),
        }
    }
}

impl PortConfiguration {
    /// Build a configuration from caller options.
    ///
    /// `bitrate` falls back to `default_baud`. Recognized pass-through keys
    /// are `dataBits`, `parity`, `stopBits` and `flowControl`; any other key
    /// is left for other transports and ignored here.
    pub fn from_options(
        options: &OpenOptions,
        default_baud: u32,
        timeout: Duration,
    ) -> Result<Self, PortError> {
        let mut config = Self {
            baud_rate: options.bitrate.unwrap_or(default_baud),
            timeout,
            ..Self::default()
        };

        if let Some(value) = options.extra.get("dataBits") {
            config.data_bits = DataBits::from_value(value)?;
        }
        if let Some(value) = options.extra.get("parity") {
            config.parity = Parity::from_value(value)?;
        }
        if let Some(value) = options.extra.get("stopBits") {
            config.stop_bits = StopBits::from_value(value)?;
        }
        if let Some(value) = options.extra.get("flowControl") {
            config.flow_control = FlowControl::from_value(value)?;
        }

        Ok(config)
    }
}

fn invalid_option(key: &str, value: &Value) -> PortError {
    PortError::config(format!("unsupported {key} option: {value}"))
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    fn from_value(value: &Value) -> Result<Self, PortError> {
        match value.as_u64() {
            Some(5) => Ok(Self::Five),
            Some(6) => Ok(Self::Six),
            Some(7) => Ok(Self::Seven),
            Some(8) => Ok(Self::Eight),
            _ => Err(invalid_option("dataBits", value)),
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl FlowControl {
    fn from_value(value: &Value) -> Result<Self, PortError> {
        match value {
            Value::Bool(true) => Ok(Self::Hardware),
            Value::Bool(false) => Ok(Self::None),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "none" => Ok(Self::None),
                "software" => Ok(Self::Software),
                "hardware" => Ok(Self::Hardware),
                _ => Err(invalid_option("flowControl", value)),
            },
            _ => Err(invalid_option("flowControl", value)),
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Parity {
    fn from_value(value: &Value) -> Result<Self, PortError> {
        match value.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("none") => Ok(Self::None),
            Some("odd") => Ok(Self::Odd),
            Some("even") => Ok(Self::Even),
            _ => Err(invalid_option("parity", value)),
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    fn from_value(value: &Value) -> Result<Self, PortError> {
        match value.as_u64() {
            Some(1) => Ok(Self::One),
            Some(2) => Ok(Self::Two),
            _ => Err(invalid_option("stopBits", value)),
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}
