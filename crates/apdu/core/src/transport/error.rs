//! Error types specific to card transport

use thiserror::Error;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The token left the field while an exchange was in flight
    #[error("Tag was lost")]
    TagLost,

    /// Low-level I/O failure reported by the reader
    #[error("I/O error: {0}")]
    Io(String),

    /// The channel cannot carry extended-length frames
    #[error("Extended length APDUs are not supported by this reader")]
    ExtendedLengthNotSupported,

    /// The exchange did not complete within the configured timeout
    #[error("Operation timed out")]
    Timeout,

    /// No token is present
    #[error("No card present")]
    NoCard,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Whether presenting the token again may let the operation succeed
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ExtendedLengthNotSupported)
    }

    /// Check if this error means the token is no longer reachable
    pub const fn is_tag_lost(&self) -> bool {
        matches!(self, Self::TagLost | Self::NoCard)
    }
}
