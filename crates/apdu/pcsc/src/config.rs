//! Reader connection settings

use std::time::Duration;

use pcsc::{Protocols, ShareMode as PcscShareMode};

/// Whether other applications may use the card while we hold it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Keep the card to ourselves for the whole session
    Exclusive,
    /// Let other applications talk to the card in between
    Shared,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
        }
    }
}

/// Which reader [`PcscDeviceManager::connect_strategy`](crate::PcscDeviceManager::connect_strategy) opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// The reader with this name
    Reader(String),
    /// The first reader with a card in its field
    AnyCard,
    /// The first reader listed, card or not
    FirstAvailable,
}

/// PC/SC transport settings
///
/// Tangem sessions hold the card across a security delay, so the connection
/// is exclusive by default.
#[derive(Debug, Clone)]
pub struct PcscConfig {
    /// Share mode for the card connection
    pub share_mode: ShareMode,
    /// Protocols offered when connecting
    pub protocols: Protocols,
    /// Reconnect transparently after a card reset
    pub auto_reconnect: bool,
    /// Whether the reader carries frames beyond the short length form
    pub extended_length: bool,
    /// Per-exchange timeout until the engine sets its own
    pub timeout: Duration,
    /// How long [`PcscTransport::wait_for_card`](crate::PcscTransport::wait_for_card) waits for a tap
    pub wait_timeout: Duration,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Exclusive,
            protocols: Protocols::ANY,
            auto_reconnect: true,
            extended_length: true,
            timeout: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

impl PcscConfig {
    /// Default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this share mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Offer only these protocols
    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Enable or disable reconnecting after a reset
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Declare extended-length support of the reader
    pub const fn with_extended_length(mut self, extended_length: bool) -> Self {
        self.extended_length = extended_length;
        self
    }

    /// Initial per-exchange timeout
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Time allowed for a card to be presented
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}
