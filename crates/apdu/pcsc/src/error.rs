//! Error types for PC/SC transport

use tangem_apdu_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),

    /// Card left the field mid-exchange
    #[error("Card was removed")]
    CardRemoved,

    /// Command needs extended length but the reader was configured without it
    #[error("Reader does not support extended length frames ({0} bytes)")]
    ExtendedLength(usize),

    /// Timed out waiting for a card
    #[error("Timed out waiting for a card in {0}")]
    Timeout(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::CardRemoved
            | PcscError::Pcsc(pcsc::Error::RemovedCard | pcsc::Error::ResetCard) => Self::TagLost,
            PcscError::NoCard(_) | PcscError::Pcsc(pcsc::Error::NoSmartcard) => Self::NoCard,
            PcscError::ExtendedLength(_) => Self::ExtendedLengthNotSupported,
            PcscError::Timeout(_) | PcscError::Pcsc(pcsc::Error::Timeout) => Self::Timeout,
            PcscError::Pcsc(e) => Self::io(e.to_string()),
            other => Self::other(other.to_string()),
        }
    }
}
