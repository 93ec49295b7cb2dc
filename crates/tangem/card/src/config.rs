//! Engine configuration

use std::fmt;
use std::time::Duration;

use k256::ecdsa::SigningKey;

use crate::constants::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_PAUSE};
use crate::session::EncryptionMode;

/// Configuration for a [`Tangem`](crate::Tangem) engine
#[derive(Clone)]
pub struct SessionConfig {
    /// Per-exchange timeout before widening by the security delay
    pub base_timeout: Duration,
    /// Delay assumed when a pause response carries no Pause record
    pub default_pause: Duration,
    /// Mode the engine starts the encryption probe from
    pub initial_encryption: EncryptionMode,
    /// Strongest mode the probe may escalate to
    pub max_encryption: EncryptionMode,
    /// Key of a linked terminal, if any
    pub terminal_key: Option<SigningKey>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_timeout", &self.base_timeout)
            .field("default_pause", &self.default_pause)
            .field("initial_encryption", &self.initial_encryption)
            .field("max_encryption", &self.max_encryption)
            .field("terminal_key", &self.terminal_key.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            default_pause: DEFAULT_PAUSE,
            initial_encryption: EncryptionMode::None,
            max_encryption: EncryptionMode::Strong,
            terminal_key: None,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base exchange timeout
    pub const fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    /// Set the delay assumed for pause responses without a duration
    pub const fn with_default_pause(mut self, pause: Duration) -> Self {
        self.default_pause = pause;
        self
    }

    /// Start the probe from a known mode instead of plain
    pub const fn with_initial_encryption(mut self, mode: EncryptionMode) -> Self {
        self.initial_encryption = mode;
        self
    }

    /// Cap the modes the probe may try
    pub const fn with_max_encryption(mut self, mode: EncryptionMode) -> Self {
        self.max_encryption = mode;
        self
    }

    /// Configure a linked terminal key
    pub fn with_terminal_key(mut self, key: SigningKey) -> Self {
        self.terminal_key = Some(key);
        self
    }

    /// Public key of the linked terminal, uncompressed SEC1
    pub fn terminal_public_key(&self) -> Option<Vec<u8>> {
        self.terminal_key
            .as_ref()
            .map(|key| key.verifying_key().to_encoded_point(false).as_bytes().to_vec())
    }
}
