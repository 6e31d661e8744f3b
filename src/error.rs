use thiserror::Error;

/// Why an inbound message was refused.
///
/// The `Display` text doubles as the close reason sent to the offending
/// connection, so keep it short and stable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("invalid ids")]
    InvalidIds,

    #[error("spoofed sender")]
    SpoofedSender,

    #[error("unknown message type {0}")]
    UnknownType(String),

    #[error("malformed message")]
    Malformed(String),

    /// The peer was already cleaned up; nothing to do.
    #[error("peer not connected")]
    NotConnected,
}

impl RelayError {
    /// Whether the connection that caused this should be terminated.
    pub fn is_violation(&self) -> bool {
        !matches!(self, RelayError::NotConnected)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
