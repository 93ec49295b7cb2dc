//! Display utilities for the Tangem CLI

use std::fmt::Display;

use alloy_primitives::hex;
use colored::Colorize;
use tangem_card::CardState;

/// A formatted section title
pub struct SectionTitle(pub &'static str);

impl Display for SectionTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\n{}", self.0.bold().underline())
    }
}

/// Format a section header
pub const fn section_title(title: &'static str) -> SectionTitle {
    SectionTitle(title)
}

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format a key-value section for important outputs
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

fn or_unknown<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".dimmed().to_string(), |v| v.to_string())
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "yes".green().to_string(),
        Some(false) => "no".red().to_string(),
        None => "unknown".dimmed().to_string(),
    }
}

/// Card identity, wallet and issuer data
pub fn card_state(state: &CardState) -> String {
    let mut sections = vec![key_value_box(
        "Card",
        vec![
            ("Card ID", or_unknown(state.card_id.as_deref())),
            ("Status", or_unknown(state.status)),
            ("Manufacturer", or_unknown(state.manufacturer_id.as_deref())),
            ("Firmware", or_unknown(state.firmware.as_ref())),
            ("Encryption", state.encryption_mode.to_string()),
            ("Batch", or_unknown(state.card_data.batch.as_deref())),
            ("Blockchain", or_unknown(state.card_data.blockchain_id.as_deref())),
            ("Issuer", or_unknown(state.card_data.issuer_id.as_deref())),
            ("Manufactured", or_unknown(state.card_data.manufacture_date)),
            ("Settings", or_unknown(state.settings)),
            ("Security delay", format!("{:?}", state.security_delay)),
            ("Default PIN2", flag(state.use_default_pin2)),
        ],
    )];

    if let Some(key) = &state.wallet_public_key {
        sections.push(key_value_box(
            "Wallet",
            vec![
                ("Public key", hex::encode(key.compressed)),
                ("Address", or_unknown(state.wallet_address.as_deref())),
                ("Curve", or_unknown(state.curve_id.as_deref())),
                ("Remaining signatures", or_unknown(state.remaining_signatures)),
                ("Signed hashes", or_unknown(state.signed_hashes)),
            ],
        ));
    }

    if let Some(symbol) = &state.card_data.token_symbol {
        sections.push(key_value_box(
            "Token",
            vec![
                ("Symbol", symbol.clone()),
                (
                    "Contract",
                    or_unknown(state.card_data.token_contract_address.as_deref()),
                ),
                ("Decimals", or_unknown(state.card_data.token_decimal)),
            ],
        ));
    }

    if state.offline_balance.is_some() || state.denomination.is_some() {
        sections.push(key_value_box(
            "Issuer data",
            vec![
                ("Offline balance", or_unknown(state.offline_balance.as_ref().map(hex::encode))),
                ("Denomination", or_unknown(state.denomination_text.as_deref())),
            ],
        ));
    }

    sections.join("\n\n")
}
