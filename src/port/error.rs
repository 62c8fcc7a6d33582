//! Port-specific error types.
//!
//! Transport failures stay in this type until the connection layer converts
//! them into result-record sentinels; only open failures travel further up.

use thiserror::Error;

/// Errors reported by a serial transport.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed or an open option was invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The transport was already closed.
    #[error("Port is closed")]
    Closed,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a `serialport` open error onto the variants callers match on.
    pub fn from_open(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::InvalidInput => Self::config(err.to_string()),
            _ => Self::Serial(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid parity");
        assert_eq!(err.to_string(), "Configuration error: Invalid parity");

        assert_eq!(PortError::Closed.to_string(), "Port is closed");
    }

    #[test]
    fn test_from_open_no_device() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            PortError::from_open("COM7", err),
            PortError::NotFound(name) if name == "COM7"
        ));
    }

    #[test]
    fn test_from_open_invalid_input() {
        let err = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        assert!(matches!(
            PortError::from_open("COM7", err),
            PortError::Config(msg) if msg.contains("bad baud")
        ));
    }
}
