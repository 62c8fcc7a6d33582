//! Transport collaborator layer.
//!
//! Provides the traits the connection layer talks to, the `serialport`-backed
//! implementation, and a mock for tests.

pub mod error;
pub mod mock;
pub mod system;
pub mod traits;

pub use error::PortError;
pub use mock::{MockSerialHost, MockSerialPort};
pub use system::{SystemSerial, SystemTransport, TransportSettings};
pub use traits::*;
