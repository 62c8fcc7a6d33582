use crate::port::PortError;
use crate::types::ConnectionId;
use thiserror::Error;

/// A specialized `Result` type for facade operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to API callers.
///
/// Write, flush and close failures never appear here: they are reported via
/// `WriteInfo::FAILED`, a `false` flag, or only logged.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The id is not registered: never issued, or already closed.
    #[error("Unknown connection id {0}")]
    UnknownConnection(ConnectionId),

    /// The transport reported an error instead of opening the port.
    #[error("Failed to open port '{port}': {source}")]
    TransportOpen {
        port: String,
        #[source]
        source: PortError,
    },

    /// Every connection id has been issued once.
    #[error("Connection ids exhausted")]
    IdsExhausted,

    /// A bridge request could not be decoded.
    #[error("The request payload is invalid: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Stable name of the variant, used in bridge error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownConnection(_) => "UnknownConnection",
            Self::TransportOpen { .. } => "TransportOpenError",
            Self::IdsExhausted => "ConnectionIdsExhausted",
            Self::InvalidRequest(_) => "InvalidRequest",
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}
