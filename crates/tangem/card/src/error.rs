use std::time::Duration;

use tangem_apdu_core::{FrameError, StatusWord, TlvError, TransportError};

/// Result type for card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for card operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// TLV encoding or decoding errors
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// Command frame errors
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The response could not be parsed
    #[error("Failed to parse response: {0}")]
    ResponseParse(String),

    /// The card rejected the PIN or PIN2
    #[error("Invalid PIN")]
    InvalidPin,

    /// The card is running a security delay and the caller asked not to wait
    #[error("Security delay in progress, {remaining:?} remaining")]
    NeedPause {
        /// Remaining delay reported by the card
        remaining: Duration,
    },

    /// The command must be sent inside an encrypted session
    #[error("Card requires encryption")]
    NeedEncryption,

    /// The card could not be reached with any encryption mode
    #[error("Can't get supported encryption mode")]
    UnsupportedEncryption,

    /// Any other status word
    #[error("Card returned status {0}")]
    Status(StatusWord),

    /// A locally produced signature failed verification
    #[error("Signature self-verification failed")]
    SelfVerification,

    /// Issuer data did not verify against the issuer key
    #[error("Invalid issuer data: {0}")]
    InvalidIssuerData(&'static str),

    /// Hash batch rejected before sending
    #[error("Invalid hashes: {0}")]
    InvalidHashes(&'static str),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The command needs data from a previous Read
    #[error("Read the card first")]
    ReadRequired,

    /// The transport did not report a token identifier
    #[error("Transport has no token identifier")]
    NoTokenId,

    /// The card is in the wrong state for the command
    #[error("Invalid card state: {0}")]
    InvalidState(&'static str),

    /// The card settings do not allow the requested signing method
    #[error("Signing method not allowed: {0}")]
    SigningMethodNotAllowed(&'static str),

    /// The coin engine could not derive an address
    #[error("Coin engine error: {0}")]
    CoinEngine(String),

    /// Malformed data
    #[error("Invalid data: {0}")]
    InvalidData(&'static str),

    /// Symmetric cipher failure
    #[error("Cipher error: {0}")]
    Cipher(&'static str),

    /// ECDSA errors
    #[error(transparent)]
    Ecdsa(#[from] k256::ecdsa::Error),

    /// Elliptic curve errors
    #[error(transparent)]
    Curve(#[from] k256::elliptic_curve::Error),

    /// The blocking worker failed
    #[error("Task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether presenting the card again may let the operation succeed
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::NeedPause { .. } => true,
            _ => false,
        }
    }
}
