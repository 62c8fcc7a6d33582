//! Serial Handle API Library
//!
//! A connection-handle based API over serial ports: callers open a port and
//! get back an integer connection id, then read, write, flush and close
//! through that id. Inbound bytes are buffered per connection and handed out
//! in FIFO order.
//!
//! # Modules
//!
//! - `api`: The `SerialApi` facade
//! - `registry`: Connection id allocation and lookup
//! - `connection`: Per-connection inbound buffer and transport event pump
//! - `enumerator`: Host port listing
//! - `port`: Transport traits, system and mock implementations
//! - `codec`: Byte buffer helpers, Latin-1 conversion and debug dumps
//! - `types`: Request and result shapes
//! - `error`: Facade error taxonomy
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup
//! - `bridge`: JSON-lines command bridge used by the binary
//!
//! # Example
//!
//! ```rust
//! use serial_handle_api::{MockSerialHost, OpenOptions, SerialApi};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let host = MockSerialHost::with_ports(["COM1"]);
//! let api = SerialApi::new(Arc::new(host.clone()), Arc::new(host.clone()));
//!
//! let info = api.open("COM1", OpenOptions::with_bitrate(9600)).await.unwrap();
//! api.write(info.connection_id, b"AT\r").await.unwrap();
//! assert!(api.close(info.connection_id).await.unwrap());
//! # });
//! ```

pub mod api;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod connection;
pub mod enumerator;
pub mod error;
pub mod logging;
pub mod port;
pub mod registry;
pub mod types;

// Re-export commonly used types for convenience
pub use api::SerialApi;
pub use config::{Config, ConfigError, ConfigLoader, LogFormat, LoggingConfig, SerialConfig};
pub use error::{ApiError, ApiResult};
pub use port::{
    HostEnumeration, MockSerialHost, MockSerialPort, PortError, SerialTransport, SystemSerial,
    TransportEvent, TransportFactory,
};
pub use types::{ConnectionId, ControlSignalOptions, OpenInfo, OpenOptions, ReadInfo, WriteInfo};
