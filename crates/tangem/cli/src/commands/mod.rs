use clap::Subcommand;
use tangem_apdu_transport_pcsc::{PcscDeviceManager, PcscTransport};
use tangem_card::Tangem;

mod card_operations;
mod credentials;
mod data_management;
mod wallet_operations;

pub use card_operations::*;
pub use credentials::*;
pub use data_management::*;
pub use wallet_operations::*;

use crate::utils::CliResult;

/// Engine bound to a PC/SC reader
pub type Card = Tangem<PcscTransport>;

/// Define subcommands for the CLI
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List available readers
    List,

    /// Read the card and show its state
    Read,

    /// Challenge the card key to confirm the card is genuine
    Verify,

    /// Challenge the wallet key
    CheckWallet,

    /// Sign hashes, or a raw transaction with --raw
    Sign {
        /// Hashes to sign (hex, equal length, at most 10)
        #[arg(required = true)]
        data: Vec<String>,

        /// Treat the single argument as a raw transaction the card hashes
        #[arg(long)]
        raw: bool,

        /// Issuer transaction key (hex) for cards that need issuer validation
        #[arg(long)]
        issuer_key: Option<String>,
    },

    /// Generate the wallet key on an empty card
    CreateWallet,

    /// Destroy the wallet key
    PurgeWallet {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Change PIN1 and PIN2
    SwapPin {
        /// New PIN1
        #[arg(required = true)]
        new_pin: String,

        /// New PIN2
        #[arg(required = true)]
        new_pin2: String,

        /// Return at the first security delay instead of waiting it out
        #[arg(long)]
        no_wait: bool,
    },

    /// Find out whether PIN2 is still the default
    CheckPin2,

    /// Read or write issuer data
    IssuerData {
        #[command(subcommand)]
        action: IssuerDataAction,
    },

    /// Bump the card validation counter
    Validate,

    /// Hash firmware code pages with a challenge
    VerifyCode {
        /// First code page address
        #[arg(long, value_parser = parse_u32)]
        address: u32,

        /// Number of code pages
        #[arg(long, default_value_t = 1)]
        count: u16,

        /// Challenge in hex (random when omitted)
        #[arg(long)]
        challenge: Option<String>,
    },
}

/// Issuer data actions
#[derive(Subcommand, Debug, Clone)]
pub enum IssuerDataAction {
    /// Read and verify issuer data
    Get {
        /// Read the extra issuer data block instead
        #[arg(long)]
        extra: bool,
    },

    /// Sign issuer data with the issuer data key and write it
    Write {
        /// Data in hex
        #[arg(required = true)]
        data: String,

        /// Issuer data private key in hex
        #[arg(long, required = true)]
        key: String,

        /// Write the extra issuer data block instead
        #[arg(long)]
        extra: bool,
    },
}

/// Accept decimal or `0x` hex
fn parse_u32(value: &str) -> Result<u32, String> {
    match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
    .map_err(|e| e.to_string())
}

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> CliResult {
    crate::utils::reader::list_readers(manager)
}

/// Run one card command
///
/// Every command except `list` starts with a Read so the engine knows the
/// card.
pub fn execute(card: &mut Card, command: &Commands) -> CliResult {
    match command {
        Commands::List => Ok(()),
        Commands::Read => read_command(card),
        Commands::Verify => verify_command(card),
        Commands::CheckWallet => check_wallet_command(card),
        Commands::Sign {
            data,
            raw,
            issuer_key,
        } => sign_command(card, data, *raw, issuer_key.as_deref()),
        Commands::CreateWallet => create_wallet_command(card),
        Commands::PurgeWallet { yes } => purge_wallet_command(card, *yes),
        Commands::SwapPin {
            new_pin,
            new_pin2,
            no_wait,
        } => swap_pin_command(card, new_pin, new_pin2, *no_wait),
        Commands::CheckPin2 => check_pin2_command(card),
        Commands::IssuerData { action } => match action {
            IssuerDataAction::Get { extra } => get_issuer_data_command(card, *extra),
            IssuerDataAction::Write { data, key, extra } => {
                write_issuer_data_command(card, data, key, *extra)
            }
        },
        Commands::Validate => validate_command(card),
        Commands::VerifyCode {
            address,
            count,
            challenge,
        } => verify_code_command(card, *address, *count, challenge.as_deref()),
    }
}
