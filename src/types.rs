//! Request and result shapes exchanged with API callers.
//!
//! Field names serialize in camelCase so the JSON bridge speaks the same
//! vocabulary as browser serial APIs (`connectionId`, `bytesRead`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque handle to an open connection.
///
/// Issued by the registry starting at 1, strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u32);

impl ConnectionId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ConnectionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Options for opening a port.
///
/// `bitrate` maps to the transport baud rate. Every other key is kept in
/// `extra` and handed to the transport unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OpenOptions {
    pub fn with_bitrate(bitrate: u32) -> Self {
        Self {
            bitrate: Some(bitrate),
            ..Default::default()
        }
    }

    /// Add a pass-through option for the transport.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub connection_id: ConnectionId,
}

/// Result of a read: the bytes taken from the front of the inbound buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadInfo {
    pub bytes_read: usize,
    pub data: Vec<u8>,
}

impl ReadInfo {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            bytes_read: data.len(),
            data,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Result of a write. `bytes_written` is `-1` when the transport failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteInfo {
    pub bytes_written: i64,
}

impl WriteInfo {
    /// Sentinel reported when the write failed.
    pub const FAILED: i64 = -1;

    pub fn written(count: usize) -> Self {
        Self {
            bytes_written: i64::try_from(count).unwrap_or(i64::MAX),
        }
    }

    pub fn failed() -> Self {
        Self {
            bytes_written: Self::FAILED,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.bytes_written == Self::FAILED
    }
}

/// Modem control lines. Not tracked; always reported in the default state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSignalOptions {
    pub dtr: bool,
    pub rts: bool,
    pub dcd: bool,
    pub cts: bool,
}
