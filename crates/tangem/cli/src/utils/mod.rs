//! Utility functions and types for the Tangem CLI

pub mod display;
pub mod reader;
pub mod session;

use std::error::Error;
use std::time::Duration;

use alloy_primitives::hex;
use clap::{Args, ValueEnum};
use k256::ecdsa::SigningKey;
use tangem_card::EncryptionMode;

/// Error type shared by the command handlers; crosses the blocking worker
pub type CliError = Box<dyn Error + Send + Sync>;

/// Result of a command handler
pub type CliResult<T = ()> = Result<T, CliError>;

/// Encryption modes selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// No encryption
    None,
    /// Fast session (shared secret from the PIN)
    Fast,
    /// Strong session (ECDH)
    Strong,
}

impl From<Encryption> for EncryptionMode {
    fn from(value: Encryption) -> Self {
        match value {
            Encryption::None => Self::None,
            Encryption::Fast => Self::Fast,
            Encryption::Strong => Self::Strong,
        }
    }
}

/// PINs and session options common to every card command
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// PIN1 (the default PIN is used when omitted)
    #[arg(long, global = true)]
    pub pin: Option<String>,

    /// PIN2 for signing and wallet management (the default PIN2 is used when omitted)
    #[arg(long, global = true)]
    pub pin2: Option<String>,

    /// Highest encryption mode to negotiate
    #[arg(long, value_enum, default_value_t = Encryption::Strong, global = true)]
    pub max_encryption: Encryption,

    /// Seconds to wait for a card to be tapped
    #[arg(long, default_value_t = 30, global = true)]
    pub wait: u64,
}

impl SessionArgs {
    /// How long to wait for a card
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait)
    }
}

/// Decode a hex argument, with or without `0x`
pub fn parse_hex(value: &str) -> CliResult<Vec<u8>> {
    Ok(hex::decode(value.trim())?)
}

/// Decode a secp256k1 private key given in hex
pub fn parse_signing_key(value: &str) -> CliResult<SigningKey> {
    let bytes = parse_hex(value)?;
    Ok(SigningKey::from_slice(&bytes)?)
}

/// Ask the user to confirm a destructive operation
pub fn confirm(message: &str) -> bool {
    use std::io::{self, Write};
    print!("{message} (y/n): ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}
